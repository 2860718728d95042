//! In-memory store implementations.
//!
//! Semantics match the PostgreSQL repositories: ordering, the
//! running-only finalize guard, the success-only dedup lookup, and
//! pruning that keeps the newest successful record per file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use mft_core::error::AppError;
use mft_core::result::AppResult;
use mft_core::types::{PageRequest, PageResponse};
use mft_entity::{FileMetadata, HistoryStatus, Job, JobHistory, TransferConfig};

use crate::store::{ConfigStore, HistoryStore, JobStore, MetadataStore};

/// In-memory job store.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: DashMap<Uuid, Job>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut jobs: Vec<Job>) -> Vec<Job> {
        jobs.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_at.cmp(&b.created_at)));
        jobs
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Job>> {
        Ok(self.jobs.get(&id).map(|j| j.clone()))
    }

    async fn list(&self) -> AppResult<Vec<Job>> {
        Ok(Self::sorted(self.jobs.iter().map(|j| j.clone()).collect()))
    }

    async fn list_enabled(&self) -> AppResult<Vec<Job>> {
        Ok(Self::sorted(
            self.jobs
                .iter()
                .filter(|j| j.enabled)
                .map(|j| j.clone())
                .collect(),
        ))
    }

    async fn create(&self, job: &Job) -> AppResult<Job> {
        if self.jobs.contains_key(&job.id) {
            return Err(AppError::conflict(format!("Job {} already exists", job.id)));
        }
        self.jobs.insert(job.id, job.clone());
        Ok(job.clone())
    }

    async fn update(&self, job: &Job) -> AppResult<Job> {
        let mut entry = self
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| AppError::not_found(format!("Job {} not found", job.id)))?;
        let (last_run, next_run, created_at) = (entry.last_run, entry.next_run, entry.created_at);
        *entry = Job {
            last_run,
            next_run,
            created_at,
            updated_at: Utc::now(),
            ..job.clone()
        };
        Ok(entry.clone())
    }

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> AppResult<Job> {
        let mut entry = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))?;
        entry.enabled = enabled;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn update_schedule_times(
        &self,
        id: Uuid,
        last_run: Option<DateTime<Utc>>,
        next_run: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        if let Some(mut entry) = self.jobs.get_mut(&id) {
            if last_run.is_some() {
                entry.last_run = last_run;
            }
            entry.next_run = next_run;
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.jobs.remove(&id).is_some())
    }

    async fn references_config(&self, config_id: Uuid) -> AppResult<bool> {
        Ok(self.jobs.iter().any(|j| j.config_ids.contains(&config_id)))
    }
}

/// In-memory transfer config store.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    configs: DashMap<Uuid, TransferConfig>,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<TransferConfig>> {
        Ok(self.configs.get(&id).map(|c| c.clone()))
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<TransferConfig>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.configs.get(id).map(|c| c.clone()))
            .collect())
    }

    async fn list(&self) -> AppResult<Vec<TransferConfig>> {
        let mut configs: Vec<_> = self.configs.iter().map(|c| c.clone()).collect();
        configs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(configs)
    }

    async fn create(&self, config: &TransferConfig) -> AppResult<TransferConfig> {
        if self.configs.contains_key(&config.id) {
            return Err(AppError::conflict(format!(
                "Transfer config {} already exists",
                config.id
            )));
        }
        self.configs.insert(config.id, config.clone());
        Ok(config.clone())
    }

    async fn update(&self, config: &TransferConfig) -> AppResult<TransferConfig> {
        let mut entry = self.configs.get_mut(&config.id).ok_or_else(|| {
            AppError::not_found(format!("Transfer config {} not found", config.id))
        })?;
        let created_at = entry.created_at;
        *entry = TransferConfig {
            created_at,
            updated_at: Utc::now(),
            ..config.clone()
        };
        Ok(entry.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.configs.remove(&id).is_some())
    }
}

/// In-memory history store.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    rows: DashMap<Uuid, JobHistory>,
}

impl MemoryHistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn create(&self, history: &JobHistory) -> AppResult<JobHistory> {
        self.rows.insert(history.id, history.clone());
        Ok(history.clone())
    }

    async fn finalize(&self, history: &JobHistory) -> AppResult<JobHistory> {
        let mut entry = self
            .rows
            .get_mut(&history.id)
            .ok_or_else(|| AppError::not_found(format!("History {} not found", history.id)))?;
        if entry.status != HistoryStatus::Running {
            return Err(AppError::conflict(format!(
                "History {} is already finalized",
                history.id
            )));
        }
        entry.status = history.status;
        entry.end_time = history.end_time;
        entry.bytes_transferred = history.bytes_transferred;
        entry.files_transferred = history.files_transferred;
        entry.error_message = history.error_message.clone();
        entry.config_results = history.config_results.clone();
        Ok(entry.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<JobHistory>> {
        Ok(self.rows.get(&id).map(|h| h.clone()))
    }

    async fn list_for_job(
        &self,
        job_id: Uuid,
        page: PageRequest,
    ) -> AppResult<PageResponse<JobHistory>> {
        let mut rows: Vec<_> = self
            .rows
            .iter()
            .filter(|h| h.job_id == job_id)
            .map(|h| h.clone())
            .collect();
        rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(PageResponse::from_sorted(rows, page.normalized()))
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let before = self.rows.len();
        self.rows.retain(|_, h| {
            !(h.status.is_terminal() && h.end_time.is_some_and(|end| end < cutoff))
        });
        Ok((before - self.rows.len()) as u64)
    }
}

/// Dedup identity of a file: job, config, source path and content hash.
type FileIdentity = (Uuid, Uuid, String, String);

/// In-memory file metadata store.
///
/// `latest` indexes the newest successful record per file identity and
/// backs `lookup_processed`. Pruning never removes an indexed record.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    rows: DashMap<Uuid, FileMetadata>,
    latest: DashMap<FileIdentity, FileMetadata>,
}

impl MemoryMetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn identity(metadata: &FileMetadata) -> FileIdentity {
        (
            metadata.job_id,
            metadata.config_id,
            metadata.original_path.clone(),
            metadata.file_hash.clone(),
        )
    }

    fn is_dedup_evidence(&self, metadata: &FileMetadata) -> bool {
        metadata.is_processed()
            && self
                .latest
                .get(&Self::identity(metadata))
                .is_some_and(|kept| kept.id == metadata.id)
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn record(&self, metadata: &FileMetadata) -> AppResult<()> {
        self.rows.insert(metadata.id, metadata.clone());
        if metadata.is_processed() {
            self.latest
                .entry(Self::identity(metadata))
                .and_modify(|kept| {
                    if metadata.processed_time >= kept.processed_time {
                        *kept = metadata.clone();
                    }
                })
                .or_insert_with(|| metadata.clone());
        }
        Ok(())
    }

    async fn lookup_processed(
        &self,
        job_id: Uuid,
        config_id: Uuid,
        original_path: &str,
        file_hash: &str,
    ) -> AppResult<Option<FileMetadata>> {
        let key = (
            job_id,
            config_id,
            original_path.to_string(),
            file_hash.to_string(),
        );
        Ok(self.latest.get(&key).map(|m| m.clone()))
    }

    async fn list_for_history(&self, history_id: Uuid) -> AppResult<Vec<FileMetadata>> {
        let mut rows: Vec<_> = self
            .rows
            .iter()
            .filter(|m| m.history_id == history_id)
            .map(|m| m.clone())
            .collect();
        rows.sort_by(|a, b| a.processed_time.cmp(&b.processed_time));
        Ok(rows)
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let expired: Vec<Uuid> = self
            .rows
            .iter()
            .filter(|m| m.processed_time < cutoff && !self.is_dedup_evidence(m))
            .map(|m| m.id)
            .collect();
        Ok(expired
            .iter()
            .filter(|id| self.rows.remove(id).is_some())
            .count() as u64)
    }
}
