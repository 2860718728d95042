//! Administrative job operations that keep the store and the scheduler in
//! step.

use std::sync::Arc;

use chrono::Utc;
use tracing;
use uuid::Uuid;

use mft_core::error::AppError;
use mft_core::result::AppResult;
use mft_core::types::{PageRequest, PageResponse};
use mft_database::Stores;
use mft_entity::{FileMetadata, Job, JobHistory};

use crate::runner::JobRunner;
use crate::schedule::CronSchedule;
use crate::scheduler::Scheduler;

/// Job management on top of the stores, the scheduler and the runner.
#[derive(Debug, Clone)]
pub struct JobService {
    stores: Stores,
    scheduler: Scheduler,
    runner: Arc<JobRunner>,
}

impl JobService {
    /// Create the service.
    pub fn new(stores: Stores, scheduler: Scheduler, runner: Arc<JobRunner>) -> Self {
        Self {
            stores,
            scheduler,
            runner,
        }
    }

    /// All jobs, by name.
    pub async fn list(&self) -> AppResult<Vec<Job>> {
        self.stores.jobs.list().await
    }

    /// One job.
    pub async fn get(&self, id: Uuid) -> AppResult<Job> {
        self.stores
            .jobs
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))
    }

    /// Validate and store a new job, registering it when enabled.
    pub async fn create(&self, job: Job) -> AppResult<Job> {
        self.check(&job).await?;
        let created = self.stores.jobs.create(&job).await?;
        self.scheduler.register(&created).await?;
        tracing::info!("Job '{}' created ({})", created.name, created.id);
        self.get(created.id).await
    }

    /// Validate and store changes to a job, then re-register it.
    pub async fn update(&self, job: Job) -> AppResult<Job> {
        self.check(&job).await?;
        let updated = self.stores.jobs.update(&job).await?;
        self.scheduler.register(&updated).await?;
        tracing::info!("Job '{}' updated", updated.name);
        self.get(updated.id).await
    }

    /// Enable or disable a job.
    ///
    /// Enabling registers first, so a job whose schedule does not parse stays
    /// disabled and the error is returned.
    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> AppResult<Job> {
        let mut job = self.get(id).await?;
        job.enabled = enabled;
        if enabled {
            self.scheduler.register(&job).await?;
            self.stores.jobs.set_enabled(id, true).await?;
        } else {
            self.stores.jobs.set_enabled(id, false).await?;
            self.scheduler.unregister(id).await?;
        }
        tracing::info!(
            "Job '{}' {}",
            job.name,
            if enabled { "enabled" } else { "disabled" }
        );
        self.get(id).await
    }

    /// Copy a job. The copy starts disabled.
    pub async fn duplicate(&self, id: Uuid) -> AppResult<Job> {
        let source = self.get(id).await?;
        let copy = self.stores.jobs.create(&source.duplicate(Utc::now())).await?;
        tracing::info!("Job '{}' duplicated as '{}'", source.name, copy.name);
        Ok(copy)
    }

    /// Delete a job. Its history is kept.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.scheduler.unregister(id).await?;
        if !self.stores.jobs.delete(id).await? {
            return Err(AppError::not_found(format!("Job {id} not found")));
        }
        tracing::info!("Job {} deleted", id);
        Ok(())
    }

    /// Start a manual run in the background.
    pub async fn run_now(&self, id: Uuid) -> AppResult<JobHistory> {
        self.runner.run_now(id).await
    }

    /// Executions of a job, newest first.
    pub async fn history(
        &self,
        job_id: Uuid,
        page: PageRequest,
    ) -> AppResult<PageResponse<JobHistory>> {
        self.stores
            .history
            .list_for_job(job_id, page.normalized())
            .await
    }

    /// One execution.
    pub async fn execution(&self, history_id: Uuid) -> AppResult<JobHistory> {
        self.stores
            .history
            .find_by_id(history_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("History {history_id} not found")))
    }

    /// File records of one execution.
    pub async fn files(&self, history_id: Uuid) -> AppResult<Vec<FileMetadata>> {
        self.execution(history_id).await?;
        self.stores.metadata.list_for_history(history_id).await
    }

    /// Delete a transfer config unless a job still references it.
    pub async fn delete_config(&self, id: Uuid) -> AppResult<()> {
        self.stores.delete_config(id).await
    }

    /// Field checks, schedule syntax and config references.
    async fn check(&self, job: &Job) -> AppResult<()> {
        job.validate()?;
        CronSchedule::parse(&job.schedule)?;
        if job.config_ids.is_empty() {
            return Err(AppError::validation("A job needs at least one transfer config"));
        }
        let found = self.stores.configs.find_many(&job.config_ids).await?;
        if let Some(missing) = job
            .config_ids
            .iter()
            .find(|id| !found.iter().any(|c| c.id == **id))
        {
            return Err(AppError::validation(format!(
                "Transfer config {missing} does not exist"
            )));
        }
        Ok(())
    }
}
