//! In-memory form store.
//!
//! Keeps every form in a vector behind an async lock. Insertion order is the vector
//! order. Forms are lost on restart.

use crate::db::{
    errors::Result,
    handlers::forms::FormStore,
    models::forms::{FormCreateDBRequest, FormDBResponse},
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryFormStore {
    forms: Arc<RwLock<Vec<FormDBResponse>>>,
}

impl InMemoryFormStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FormStore for InMemoryFormStore {
    async fn insert(&self, request: &FormCreateDBRequest) -> Result<FormDBResponse> {
        request.validate()?;

        let form = FormDBResponse {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            details: request.details.clone(),
            image: request.image.clone(),
            created_at: Utc::now(),
        };
        self.forms.write().await.push(form.clone());

        Ok(form)
    }

    async fn find_all(&self) -> Result<Vec<FormDBResponse>> {
        Ok(self.forms.read().await.clone())
    }
}
