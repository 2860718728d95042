//! Store bundle that dispatches to the configured backend.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use mft_core::config::{DatabaseConfig, StoreProvider};
use mft_core::error::AppError;
use mft_core::result::AppResult;

use crate::connection::DatabasePool;
use crate::memory::{MemoryConfigStore, MemoryHistoryStore, MemoryJobStore, MemoryMetadataStore};
use crate::repositories::{ConfigRepository, HistoryRepository, JobRepository, MetadataRepository};
use crate::store::{ConfigStore, HistoryStore, JobStore, MetadataStore};

/// The four stores the engine works with, selected at construction time.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Scheduled jobs.
    pub jobs: Arc<dyn JobStore>,
    /// Transfer configs.
    pub configs: Arc<dyn ConfigStore>,
    /// Execution history.
    pub history: Arc<dyn HistoryStore>,
    /// Per-file outcomes.
    pub metadata: Arc<dyn MetadataStore>,
    pool: Option<DatabasePool>,
}

impl Stores {
    /// Open the backend named by `config.provider`.
    pub async fn open(config: &DatabaseConfig) -> AppResult<Self> {
        match config.provider {
            StoreProvider::Postgres => {
                let pool = DatabasePool::connect(config).await?;
                info!("Using PostgreSQL stores");
                Ok(Self::postgres(pool))
            }
            StoreProvider::Memory => {
                info!("Using in-memory stores; data is lost on restart");
                Ok(Self::memory())
            }
        }
    }

    /// Stores backed by PostgreSQL.
    pub fn postgres(pool: DatabasePool) -> Self {
        let pg = pool.pool().clone();
        Self {
            jobs: Arc::new(JobRepository::new(pg.clone())),
            configs: Arc::new(ConfigRepository::new(pg.clone())),
            history: Arc::new(HistoryRepository::new(pg.clone())),
            metadata: Arc::new(MetadataRepository::new(pg)),
            pool: Some(pool),
        }
    }

    /// Fresh, empty in-memory stores.
    pub fn memory() -> Self {
        Self {
            jobs: Arc::new(MemoryJobStore::new()),
            configs: Arc::new(MemoryConfigStore::new()),
            history: Arc::new(MemoryHistoryStore::new()),
            metadata: Arc::new(MemoryMetadataStore::new()),
            pool: None,
        }
    }

    /// Delete a transfer config, refusing while any job references it.
    pub async fn delete_config(&self, id: Uuid) -> AppResult<()> {
        if self.jobs.references_config(id).await? {
            return Err(AppError::conflict(format!(
                "Transfer config {id} is still referenced by a job"
            )));
        }
        if !self.configs.delete(id).await? {
            return Err(AppError::not_found(format!("Transfer config {id} not found")));
        }
        info!(config_id = %id, "Transfer config deleted");
        Ok(())
    }

    /// Backend health. In-memory stores are always healthy.
    pub async fn health_check(&self) -> AppResult<bool> {
        match &self.pool {
            Some(pool) => pool.health_check().await,
            None => Ok(true),
        }
    }

    /// Release database connections.
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
