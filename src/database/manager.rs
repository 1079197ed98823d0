use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::{DatabaseConfig, StorageBackend};
use crate::database::memory::MemoryBackend;
use crate::database::postgres::PgBackend;
use crate::database::store::{PositionStore, StoreError, UserStore};

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// The stores a running service talks to, opened from configuration
#[derive(Clone)]
pub struct Stores {
    pub positions: Arc<dyn PositionStore>,
    pub users: Arc<dyn UserStore>,
}

impl Stores {
    pub fn memory() -> Self {
        let backend = MemoryBackend::new();
        Self {
            positions: Arc::new(backend.clone()),
            users: Arc::new(backend),
        }
    }

    pub fn postgres(backend: PgBackend) -> Self {
        Self {
            positions: Arc::new(backend.clone()),
            users: Arc::new(backend),
        }
    }
}

/// Opens connection pools and backends described by [`DatabaseConfig`]
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open the configured backend. Postgres schemas are migrated on open.
    pub async fn open(config: &DatabaseConfig) -> Result<Stores, DatabaseError> {
        match config.backend {
            StorageBackend::Memory => {
                info!("Using in-memory store");
                Ok(Stores::memory())
            }
            StorageBackend::Postgres => {
                let pool = Self::connect(config).await?;
                let backend = PgBackend::new(pool);
                backend.migrate().await?;
                Ok(Stores::postgres(backend))
            }
        }
    }

    /// Build a pool for the configured DATABASE_URL
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Created database pool for: {}", Self::redacted_url(url)?);
        Ok(pool)
    }

    /// Connection string safe to log: password removed
    fn redacted_url(raw: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if url.password().is_some() {
            url.set_password(Some("****"))
                .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        Ok(url.into())
    }
}
