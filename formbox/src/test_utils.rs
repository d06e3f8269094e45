//! Builders for HTTP tests: an app over a temporary upload directory and a chosen store.

use crate::{
    AppState, build_router,
    config::{Config, StoreConfig, StoreKind, UploadsConfig},
    db::{
        errors::{DbError, Result},
        handlers::{FormStore, InMemoryFormStore},
        models::forms::{FormCreateDBRequest, FormDBResponse},
    },
    uploads::DiskStorage,
};
use async_trait::async_trait;
use axum_test::TestServer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<dyn FormStore>,
    pub uploads_dir: PathBuf,
    _dir: TempDir,
}

/// In-memory store, uploads under `<root>/uploads`
pub fn create_test_config(root: &Path) -> Config {
    Config {
        store: StoreConfig { kind: StoreKind::Memory },
        uploads: UploadsConfig {
            dir: root.join("uploads"),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn create_test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = create_test_config(dir.path());
    create_test_app_with(config, dir, Arc::new(InMemoryFormStore::new()))
}

/// `dir` is kept alive for as long as the app
pub fn create_test_app_with(config: Config, dir: TempDir, store: Arc<dyn FormStore>) -> TestApp {
    let uploads_dir = config.uploads.dir.clone();
    let state = AppState::builder()
        .config(config)
        .store(store.clone())
        .uploads(Arc::new(DiskStorage::new(&uploads_dir)))
        .build();
    let router = build_router(state).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        store,
        uploads_dir,
        _dir: dir,
    }
}

/// Names of the files currently in the app's upload directory
pub fn uploaded_files(app: &TestApp) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(&app.uploads_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// A store whose every call fails as if the database were down
pub struct UnreachableFormStore;

#[async_trait]
impl FormStore for UnreachableFormStore {
    async fn insert(&self, _request: &FormCreateDBRequest) -> Result<FormDBResponse> {
        Err(DbError::Connectivity(sqlx::Error::PoolTimedOut))
    }

    async fn find_all(&self) -> Result<Vec<FormDBResponse>> {
        Err(DbError::Connectivity(sqlx::Error::PoolTimedOut))
    }
}
