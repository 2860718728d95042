//! Wiring of stores, providers, scheduler, runner and job service.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing;

use mft_core::config::{AppConfig, WorkerConfig};
use mft_core::result::AppResult;
use mft_database::Stores;
use mft_storage::{DefaultProviderFactory, ProviderFactory};

use crate::executor::TransferExecutor;
use crate::notify::WebhookDispatcher;
use crate::runner::JobRunner;
use crate::scheduler::Scheduler;
use crate::service::JobService;

/// A fully wired engine.
#[derive(Debug, Clone)]
pub struct Engine {
    /// Persistence.
    pub stores: Stores,
    /// Timer registry.
    pub scheduler: Scheduler,
    /// Run-locked executor.
    pub runner: Arc<JobRunner>,
    /// Admin operations.
    pub service: JobService,
    settings: WorkerConfig,
}

impl Engine {
    /// Build an engine with the given provider factory.
    pub fn new(
        config: &AppConfig,
        stores: Stores,
        factory: Arc<dyn ProviderFactory>,
    ) -> AppResult<Self> {
        let executor = TransferExecutor::new(&stores, factory, config.worker.clone());
        let notifier = WebhookDispatcher::new(&config.webhook)?;
        let runner = Arc::new(JobRunner::new(&stores, executor, notifier));
        let scheduler = Scheduler::new(Arc::clone(&stores.jobs), runner.clone());
        let service = JobService::new(stores.clone(), scheduler.clone(), Arc::clone(&runner));
        Ok(Self {
            stores,
            scheduler,
            runner,
            service,
            settings: config.worker.clone(),
        })
    }

    /// Build an engine with the local and rclone providers.
    pub fn with_default_providers(config: &AppConfig, stores: Stores) -> AppResult<Self> {
        let factory = Arc::new(DefaultProviderFactory::new(config.storage.clone()));
        Self::new(config, stores, factory)
    }

    /// Register enabled jobs and spawn the tick loop.
    pub async fn start(&self, cancel: watch::Receiver<bool>) -> AppResult<JoinHandle<()>> {
        self.scheduler.load_enabled().await?;
        let scheduler = self.scheduler.clone();
        let interval = Duration::from_millis(self.settings.tick_interval_ms.max(10));
        Ok(tokio::spawn(async move {
            scheduler.run(interval, cancel).await;
        }))
    }

    /// Wait for in-flight executions within the configured grace period.
    pub async fn shutdown(&self) {
        let grace = Duration::from_secs(self.settings.shutdown_grace_seconds);
        tracing::info!("Engine shutting down (grace {}s)", grace.as_secs());
        self.scheduler.shutdown(grace).await;
        self.runner.shutdown(grace).await;
        tracing::info!("Engine shut down complete");
    }
}
