//! Store traits shared by the PostgreSQL and in-memory backends.
//!
//! All writes are independent statements: concurrent callers never perform
//! read-modify-write cycles through these traits, so parallel file workers
//! can record outcomes without coordination.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use mft_core::result::AppResult;
use mft_core::types::{PageRequest, PageResponse};
use mft_entity::{FileMetadata, Job, JobHistory, TransferConfig};

/// Persistence for scheduled jobs.
#[async_trait]
pub trait JobStore: Send + Sync + Debug + 'static {
    /// Find a job by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Job>>;

    /// All jobs ordered by name.
    async fn list(&self) -> AppResult<Vec<Job>>;

    /// Enabled jobs ordered by name.
    async fn list_enabled(&self) -> AppResult<Vec<Job>>;

    /// Insert a new job.
    async fn create(&self, job: &Job) -> AppResult<Job>;

    /// Replace a job's editable fields, keeping `config_ids` order.
    async fn update(&self, job: &Job) -> AppResult<Job>;

    /// Toggle the enabled flag.
    async fn set_enabled(&self, id: Uuid, enabled: bool) -> AppResult<Job>;

    /// Write back the scheduler's `last_run`/`next_run`.
    async fn update_schedule_times(
        &self,
        id: Uuid,
        last_run: Option<DateTime<Utc>>,
        next_run: Option<DateTime<Utc>>,
    ) -> AppResult<()>;

    /// Delete a job. History rows are left in place.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Whether any job lists the config in its `config_ids`.
    async fn references_config(&self, config_id: Uuid) -> AppResult<bool>;
}

/// Persistence for transfer configs.
#[async_trait]
pub trait ConfigStore: Send + Sync + Debug + 'static {
    /// Find a config by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<TransferConfig>>;

    /// Configs with the given IDs, in no particular order. Unknown IDs are
    /// omitted.
    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<TransferConfig>>;

    /// All configs ordered by name.
    async fn list(&self) -> AppResult<Vec<TransferConfig>>;

    /// Insert a new config.
    async fn create(&self, config: &TransferConfig) -> AppResult<TransferConfig>;

    /// Replace a config.
    async fn update(&self, config: &TransferConfig) -> AppResult<TransferConfig>;

    /// Delete a config unconditionally.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

/// Persistence for job executions.
#[async_trait]
pub trait HistoryStore: Send + Sync + Debug + 'static {
    /// Insert a `Running` history row.
    async fn create(&self, history: &JobHistory) -> AppResult<JobHistory>;

    /// Write the terminal status and totals of a running execution.
    ///
    /// Fails with `Conflict` if the row is already finalized and with
    /// `NotFound` if it does not exist.
    async fn finalize(&self, history: &JobHistory) -> AppResult<JobHistory>;

    /// Find one execution.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<JobHistory>>;

    /// Executions of a job, newest first.
    async fn list_for_job(
        &self,
        job_id: Uuid,
        page: PageRequest,
    ) -> AppResult<PageResponse<JobHistory>>;

    /// Delete finalized executions that ended before `cutoff`.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}

/// Append-only per-file outcome records.
#[async_trait]
pub trait MetadataStore: Send + Sync + Debug + 'static {
    /// Append one record.
    async fn record(&self, metadata: &FileMetadata) -> AppResult<()>;

    /// Point lookup of a successful record for the same file identity
    /// within a job's config.
    async fn lookup_processed(
        &self,
        job_id: Uuid,
        config_id: Uuid,
        original_path: &str,
        file_hash: &str,
    ) -> AppResult<Option<FileMetadata>>;

    /// Records written by one execution, oldest first.
    async fn list_for_history(&self, history_id: Uuid) -> AppResult<Vec<FileMetadata>>;

    /// Delete records processed before `cutoff`, except the newest
    /// successful record per file identity, which `lookup_processed` needs.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}
