//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `config.yaml` and can be changed with the `-f` flag or the `FORMBOX_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! Sources are merged in this order (later sources override earlier ones):
//!
//! 1. **YAML config file** - base configuration
//! 2. **`FORMBOX_` environment variables** - nested keys use double underscores, e.g.
//!    `FORMBOX_UPLOADS__DIR=/var/lib/formbox`
//! 3. **`DB` and `PORT`** - the document store connection string and the listen port
//!
//! A `.env` file in the working directory is loaded into the process environment before any of
//! this happens (see `main.rs`).
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use formbox::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//! println!("Server will bind to {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use thiserror::Error;
use url::Url;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "FORMBOX_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to (`PORT`)
    pub port: u16,
    /// Document store connection string (`DB`). Required for the postgres store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Connection pool settings for the postgres store
    pub database: DatabaseConfig,
    /// Which document store implementation backs the API
    pub store: StoreConfig,
    /// Where uploaded files live and how large they may be
    pub uploads: UploadsConfig,
    /// Cross-origin request policy
    pub cors: CorsConfig,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            database_url: None,
            database: DatabaseConfig::default(),
            store: StoreConfig::default(),
            uploads: UploadsConfig::default(),
            cors: CorsConfig::default(),
            enable_otel_export: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub pool: PoolSettings,
}

/// Connection pool limits for the postgres store. Idle and lifetime limits keep sqlx's defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a request waits for a connection before failing (seconds)
    pub acquire_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
        }
    }
}

impl PoolSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub kind: StoreKind,
}

/// Document store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// PostgreSQL, reached through `DB`
    #[default]
    Postgres,
    /// Process-local store; records are lost on restart
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadsConfig {
    /// Directory uploaded files are written to and served from
    pub dir: PathBuf,
    /// Largest accepted image, in bytes
    pub max_file_size: u64,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./uploads"),
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            max_age: None,
        }
    }
}

/// An entry of `cors.allowed_origins`: `*` or an origin URL such as `https://app.example.com`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum CorsOrigin {
    Wildcard,
    Url(Url),
}

impl TryFrom<String> for CorsOrigin {
    type Error = url::ParseError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.trim() {
            "*" => Ok(CorsOrigin::Wildcard),
            origin => Url::parse(origin).map(CorsOrigin::Url),
        }
    }
}

impl From<CorsOrigin> for String {
    fn from(origin: CorsOrigin) -> Self {
        match origin {
            CorsOrigin::Wildcard => "*".to_string(),
            CorsOrigin::Url(url) => url.to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DB is not set: the postgres store needs a connection string (or set store.kind to memory)")]
    MissingDatabaseUrl,

    #[error("uploads.max_file_size must be greater than zero")]
    ZeroMaxFileSize,

    #[error("cors.allowed_origins cannot be empty")]
    NoCorsOrigins,

    #[error("database.pool.min_connections ({min}) cannot exceed max_connections ({max})")]
    PoolBounds { min: u32, max: u32 },
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.kind == StoreKind::Postgres && self.database_url.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        if self.uploads.max_file_size == 0 {
            return Err(ConfigError::ZeroMaxFileSize);
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(ConfigError::NoCorsOrigins);
        }

        let pool = &self.database.pool;
        if pool.min_connections > pool.max_connections {
            return Err(ConfigError::PoolBounds {
                min: pool.min_connections,
                max: pool.max_connections,
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("FORMBOX_").split("__").ignore(&["CONFIG"]))
            .merge(Env::raw().only(&["PORT"]))
            .merge(Env::raw().only(&["DB"]).map(|_| "database_url".into()))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
