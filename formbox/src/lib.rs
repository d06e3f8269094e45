//! # formbox: form submissions with image uploads
//!
//! `formbox` is a small HTTP backend. Clients submit a name, some details and an image as a
//! multipart form. The image is written to a directory on disk under a generated name, the form
//! is recorded in a document store with that name, and every stored form can be listed as JSON.
//! Stored images are served back under `/uploads`.
//!
//! ## Architecture
//!
//! - **HTTP layer** ([`api`]): Axum handlers for `POST /api/submitForm` and `GET /api/getForms`
//! - **Upload storage** ([`uploads`]): writes files under collision-free `<millis><ext>` names
//! - **Document store** ([`db`]): the [`db::handlers::FormStore`] trait, backed by PostgreSQL via
//!   `sqlx` or by an in-memory vector
//! - **Bootstrap** ([`config`], [`telemetry`], [`Application`]): configuration, logging, startup
//!   and graceful shutdown
//!
//! A submission writes the file first and the record second. If the record cannot be written the
//! file is removed again, so a failed submission leaves nothing behind.
//!
//! ## Request flow
//!
//! ```text
//! POST /api/submitForm ──► parse multipart ──► validate ──► DiskStorage::store ──► FormStore::insert
//! GET  /api/getForms   ──► FormStore::find_all ──► JSON
//! GET  /uploads/{name} ──► ServeDir
//! ```
//!
//! Every failure on the two API routes answers 500 with a fixed plain-text message; the cause is
//! only logged.
//!
//! ## Running
//!
//! ```no_run
//! use formbox::{Application, Config, config::Args, telemetry};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = Args::parse();
//!     let config = Config::load(&args)?;
//!     telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async { tokio::signal::ctrl_c().await.ok(); }).await
//! }
//! ```
//!
//! The PostgreSQL pool is created lazily: if the store is down at startup the server still
//! listens, and requests fail with 500 until it comes back.

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod openapi;
pub mod telemetry;
pub mod types;
pub mod uploads;

#[cfg(test)]
mod test_utils;

use crate::{
    config::{ConfigError, CorsOrigin, StoreKind},
    db::handlers::{FormStore, InMemoryFormStore, PostgresFormStore},
    openapi::ApiDoc,
    uploads::DiskStorage,
};
use anyhow::Context;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use bon::Builder;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

/// Room for multipart boundaries and the text fields on top of the image itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// How long to wait between migration attempts while the document store is unreachable
const MIGRATION_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Shared state handed to every handler
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn FormStore>,
    pub uploads: Arc<DiskStorage>,
}

/// Get the formbox database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Apply migrations, retrying until the store answers.
///
/// Runs in the background so an unreachable store never blocks startup.
async fn run_migrations(pool: PgPool) {
    loop {
        match migrator().run(&pool).await {
            Ok(()) => {
                info!("Connected to document store");
                return;
            }
            Err(e) => {
                warn!(error = %e, retry_in = ?MIGRATION_RETRY_INTERVAL, "Document store not ready");
                tokio::time::sleep(MIGRATION_RETRY_INTERVAL).await;
            }
        }
    }
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    // A `*` entry cannot be mixed into an origin list, so it overrides the others
    let allow_origin = if cors_config.allowed_origins.contains(&CorsOrigin::Wildcard) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `/api/submitForm` and `/api/getForms`
/// - `/uploads/*`: stored images, straight from the upload directory
/// - `/healthz`
/// - `/api-docs/openapi.json` and the Scalar UI at `/docs`
///
/// CORS and HTTP tracing wrap everything.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let body_limit = usize::try_from(state.config.uploads.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let api_routes = Router::new()
        .route(
            "/submitForm",
            post(api::handlers::forms::submit_form).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/getForms", get(api::handlers::forms::get_forms))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(state.uploads.root()))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let router = router.layer(create_cors_layer(&state.config)?);

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The configured server, ready to bind.
///
/// 1. [`Application::new`] prepares the upload directory and the document store
/// 2. [`Application::serve`] binds, serves until the shutdown future resolves, then closes the
///    pool and flushes telemetry
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create the upload directory, connect the document store and build the router.
    ///
    /// Fails only if the upload directory cannot be created or the configuration is unusable.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting formbox with configuration: {:#?}", config);

        let uploads = Arc::new(DiskStorage::new(&config.uploads.dir));
        uploads
            .ensure_root()
            .await
            .context("Failed to prepare the upload directory")?;

        let (store, pool): (Arc<dyn FormStore>, Option<PgPool>) = match config.store.kind {
            StoreKind::Memory => {
                info!("Using the in-memory form store, forms are lost on restart");
                (Arc::new(InMemoryFormStore::new()), None)
            }
            StoreKind::Postgres => {
                let url = config.database_url.as_deref().ok_or(ConfigError::MissingDatabaseUrl)?;
                let store = PostgresFormStore::connect_lazy(url, &config.database.pool)
                    .context("Invalid document store connection string")?;
                let pool = store.pool().clone();
                tokio::spawn(run_migrations(pool.clone()));
                (Arc::new(store), Some(pool))
            }
        };

        let state = AppState::builder()
            .config(config.clone())
            .store(store)
            .uploads(uploads)
            .build();
        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind {bind_addr}"))?;
        info!(
            "formbox listening on http://{}, uploads in {}",
            bind_addr,
            self.config.uploads.dir.display()
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{PoolSettings, StoreConfig};
    use crate::test_utils::create_test_config;
    use axum::http::StatusCode;
    use url::Url;

    #[tokio::test]
    async fn test_new_creates_upload_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = create_test_config(dir.path());
        let uploads_dir = config.uploads.dir.clone();
        assert!(!uploads_dir.exists());

        Application::new(config).await.unwrap();

        assert!(uploads_dir.is_dir());
    }

    #[tokio::test]
    async fn test_new_fails_when_upload_directory_cannot_be_created() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let mut config = create_test_config(dir.path());
        config.uploads.dir = blocker.join("uploads");

        assert!(Application::new(config).await.is_err());
    }

    #[tokio::test]
    async fn test_healthz_and_docs() {
        let dir = tempfile::tempdir().unwrap();
        let server = Application::new(create_test_config(dir.path())).await.unwrap().into_test_server();

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");

        let response = server.get("/api-docs/openapi.json").await;
        response.assert_status_ok();
        assert!(response.text().contains("/submitForm"));

        server.get("/docs").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_wildcard_cors_allows_any_origin() {
        let dir = tempfile::tempdir().unwrap();
        let server = Application::new(create_test_config(dir.path())).await.unwrap().into_test_server();

        let response = server
            .get("/api/getForms")
            .add_header("origin", "https://somewhere.example")
            .await;

        response.assert_status_ok();
        assert_eq!(response.header("access-control-allow-origin"), "*");
    }

    #[tokio::test]
    async fn test_listed_cors_origin_is_echoed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config(dir.path());
        config.cors.allowed_origins = vec![CorsOrigin::Url(Url::parse("https://app.example.com").unwrap())];
        let server = Application::new(config).await.unwrap().into_test_server();

        let allowed = server
            .get("/api/getForms")
            .add_header("origin", "https://app.example.com")
            .await;
        assert_eq!(allowed.header("access-control-allow-origin"), "https://app.example.com");

        let other = server
            .get("/api/getForms")
            .add_header("origin", "https://evil.example")
            .await;
        assert!(other.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_database_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config(dir.path());
        config.store = StoreConfig {
            kind: StoreKind::Postgres,
        };
        config.database_url = Some("postgres://formbox@127.0.0.1:1/formbox".to_string());
        config.database.pool = PoolSettings {
            acquire_timeout_secs: 1,
            ..Default::default()
        };

        let server = Application::new(config).await.unwrap().into_test_server();

        server.get("/healthz").await.assert_status_ok();
        let response = server.get("/api/getForms").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_text("Error fetching forms");
    }

    #[tokio::test]
    async fn test_postgres_without_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config(dir.path());
        config.store = StoreConfig {
            kind: StoreKind::Postgres,
        };
        config.database_url = None;

        assert!(Application::new(config).await.is_err());
    }
}
