//! Periodic pruning of old execution history and file metadata.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use mft_core::config::HousekeepingConfig;
use mft_core::error::AppError;
use mft_core::result::AppResult;
use mft_database::{HistoryStore, MetadataStore, Stores};

/// Rows removed by one pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Finalized history rows removed.
    pub history_rows: u64,
    /// File metadata rows removed.
    pub file_rows: u64,
}

/// Deletes rows older than the retention window. The newest successful
/// file record per file survives, since skip-processed depends on it.
#[derive(Debug, Clone)]
pub struct Housekeeper {
    history: Arc<dyn HistoryStore>,
    metadata: Arc<dyn MetadataStore>,
    retention_days: u32,
}

impl Housekeeper {
    /// Create a housekeeper. A retention of 0 days disables pruning.
    pub fn new(stores: &Stores, retention_days: u32) -> Self {
        Self {
            history: Arc::clone(&stores.history),
            metadata: Arc::clone(&stores.metadata),
            retention_days,
        }
    }

    /// Prune everything older than the retention window as of `now`.
    pub async fn prune(&self, now: DateTime<Utc>) -> AppResult<PruneReport> {
        if self.retention_days == 0 {
            tracing::debug!("History retention disabled; nothing pruned");
            return Ok(PruneReport::default());
        }
        let cutoff = now - Duration::days(i64::from(self.retention_days));
        let file_rows = self.metadata.prune_before(cutoff).await?;
        let history_rows = self.history.prune_before(cutoff).await?;
        tracing::info!(
            "Pruned {} history row(s) and {} file record(s) older than {}",
            history_rows,
            file_rows,
            cutoff
        );
        Ok(PruneReport {
            history_rows,
            file_rows,
        })
    }
}

/// Cron-driven maintenance tasks.
pub struct MaintenanceScheduler {
    scheduler: JobScheduler,
    housekeeper: Housekeeper,
    config: HousekeepingConfig,
}

impl std::fmt::Debug for MaintenanceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceScheduler")
            .field("schedule", &self.config.schedule)
            .finish()
    }
}

impl MaintenanceScheduler {
    /// Create the scheduler.
    pub async fn new(housekeeper: Housekeeper, config: HousekeepingConfig) -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;
        Ok(Self {
            scheduler,
            housekeeper,
            config,
        })
    }

    /// Register the pruning task if enabled, then start ticking.
    pub async fn start(&self) -> AppResult<()> {
        if !self.config.enabled {
            tracing::info!("Housekeeping disabled");
            return Ok(());
        }
        self.register_history_pruning().await?;
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Maintenance scheduler started");
        Ok(())
    }

    /// Stop the scheduler.
    pub async fn shutdown(&self) -> AppResult<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Maintenance scheduler shut down");
        Ok(())
    }

    async fn register_history_pruning(&self) -> AppResult<()> {
        let housekeeper = self.housekeeper.clone();
        let job = CronJob::new_async(self.config.schedule.as_str(), move |_uuid, _lock| {
            let housekeeper = housekeeper.clone();
            Box::pin(async move {
                if let Err(e) = housekeeper.prune(Utc::now()).await {
                    tracing::error!("History pruning failed: {}", e);
                }
            })
        })
        .map_err(|e| {
            AppError::invalid_schedule(format!(
                "Invalid housekeeping schedule '{}': {}",
                self.config.schedule, e
            ))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add history pruning schedule: {}", e))
        })?;

        tracing::info!(
            "Registered: history pruning ({}, retention {} day(s))",
            self.config.schedule,
            self.config.history_retention_days
        );
        Ok(())
    }
}
