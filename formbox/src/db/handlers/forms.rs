use crate::config::PoolSettings;
use crate::db::{
    errors::Result,
    models::forms::{FormCreateDBRequest, FormDBResponse},
};
use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::instrument;

/// Insert and list operations over the single collection of forms
#[async_trait]
pub trait FormStore: Send + Sync {
    /// Validate and persist a form, returning it with its assigned id.
    ///
    /// Returns only once the store has acknowledged the write.
    async fn insert(&self, request: &FormCreateDBRequest) -> Result<FormDBResponse>;

    /// Every form, in insertion order
    async fn find_all(&self) -> Result<Vec<FormDBResponse>>;
}

/// PostgreSQL-backed form store
#[derive(Clone)]
pub struct PostgresFormStore {
    pool: PgPool,
}

impl PostgresFormStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool without opening a connection.
    ///
    /// Only a malformed URL fails here. An unreachable server surfaces on first use.
    pub fn connect_lazy(database_url: &str, settings: &PoolSettings) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout())
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl FormStore for PostgresFormStore {
    #[instrument(skip(self, request), fields(image = %request.image), err)]
    async fn insert(&self, request: &FormCreateDBRequest) -> Result<FormDBResponse> {
        request.validate()?;

        let form = sqlx::query_as::<_, FormDBResponse>(
            r#"
            INSERT INTO forms (name, details, image)
            VALUES ($1, $2, $3)
            RETURNING id, name, details, image, created_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.details)
        .bind(&request.image)
        .fetch_one(&self.pool)
        .await?;

        Ok(form)
    }

    #[instrument(skip(self), err)]
    async fn find_all(&self) -> Result<Vec<FormDBResponse>> {
        let forms = sqlx::query_as::<_, FormDBResponse>(
            r#"
            SELECT id, name, details, image, created_at
            FROM forms
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(forms)
    }
}
