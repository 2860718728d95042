//! Execution of one job: configs strictly in order, files of a config with
//! bounded parallelism.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing;
use uuid::Uuid;

use mft_core::config::{FatalErrorScope, WorkerConfig};
use mft_core::error::AppError;
use mft_core::result::AppResult;
use mft_core::traits::RemoteEntry;
use mft_database::{ConfigStore, HistoryStore, MetadataStore, Stores};
use mft_entity::{
    ConfigRunResult, EndpointKey, FileMetadata, FileStatus, Job, JobHistory, TransferConfig,
};
use mft_storage::{FetchedFile, ProviderFactory, TransferStep};

/// Runs the transfer configs of a job and finalizes its history.
#[derive(Debug)]
pub struct TransferExecutor {
    configs: Arc<dyn ConfigStore>,
    history: Arc<dyn HistoryStore>,
    metadata: Arc<dyn MetadataStore>,
    factory: Arc<dyn ProviderFactory>,
    settings: WorkerConfig,
}

struct ConfigOutcome {
    result: ConfigRunResult,
    fatal: Option<(EndpointKey, String)>,
}

enum FileOutcome {
    Transferred { bytes: u64 },
    Skipped,
    Failed {
        error: AppError,
        fatal_endpoint: Option<EndpointKey>,
    },
    Aborted,
}

/// Per-config state shared by the file tasks.
struct FileContext<'a> {
    job_id: Uuid,
    history_id: Uuid,
    config: &'a TransferConfig,
    step: &'a TransferStep,
    abort: CancellationToken,
}

impl TransferExecutor {
    /// Create an executor over the given stores.
    pub fn new(stores: &Stores, factory: Arc<dyn ProviderFactory>, settings: WorkerConfig) -> Self {
        Self {
            configs: Arc::clone(&stores.configs),
            history: Arc::clone(&stores.history),
            metadata: Arc::clone(&stores.metadata),
            factory,
            settings,
        }
    }

    /// Execute `job` against an already created running `history` row and
    /// finalize it.
    ///
    /// Config failures are recorded in the history, never returned. An error
    /// is returned only when the history itself cannot be finalized.
    pub async fn execute(&self, job: &Job, mut history: JobHistory) -> AppResult<JobHistory> {
        tracing::info!(
            "Executing job '{}' ({} config(s), history {})",
            job.name,
            job.config_ids.len(),
            history.id
        );

        let snapshot = self.configs.find_many(&job.config_ids).await.map(|configs| {
            configs
                .into_iter()
                .map(|c| (c.id, c))
                .collect::<HashMap<_, _>>()
        });

        let mut poisoned: HashMap<EndpointKey, String> = HashMap::new();
        let mut results = Vec::with_capacity(job.config_ids.len());

        for (position, config_id) in job.config_ids.iter().copied().enumerate() {
            let config = match &snapshot {
                Ok(configs) => configs.get(&config_id),
                Err(e) => {
                    let mut result = ConfigRunResult::new(config_id, config_id.to_string(), position);
                    result.fail(format!("Could not load config: {e}"));
                    results.push(result);
                    continue;
                }
            };
            let Some(config) = config else {
                tracing::error!("Job '{}' references missing config {}", job.name, config_id);
                let mut result = ConfigRunResult::new(config_id, config_id.to_string(), position);
                result.fail(format!("Transfer config {config_id} not found"));
                results.push(result);
                continue;
            };

            if let Some(reason) = poisoned_reason(config, &poisoned) {
                tracing::warn!(
                    "Skipping config '{}' of job '{}': {}",
                    config.name,
                    job.name,
                    reason
                );
                let mut result = ConfigRunResult::new(config.id, &config.name, position);
                result.skipped = true;
                result.fail(format!("Skipped after authentication failure in {reason}"));
                results.push(result);
                continue;
            }

            let outcome = self.run_config(job.id, history.id, config, position).await;
            if let Some((key, reason)) = outcome.fatal {
                if self.settings.fatal_error_scope == FatalErrorScope::SharedProvider {
                    poisoned
                        .entry(key)
                        .or_insert_with(|| format!("config '{}': {}", config.name, reason));
                }
            }
            results.push(outcome.result);
        }

        history.finish(results, Utc::now());
        let history = self.history.finalize(&history).await?;
        tracing::info!(
            "Job '{}' finished with status {} ({} file(s), {} byte(s))",
            job.name,
            history.status,
            history.files_transferred,
            history.bytes_transferred
        );
        Ok(history)
    }

    async fn run_config(
        &self,
        job_id: Uuid,
        history_id: Uuid,
        config: &TransferConfig,
        position: usize,
    ) -> ConfigOutcome {
        let mut result = ConfigRunResult::new(config.id, &config.name, position);

        let step = match config
            .validate()
            .and_then(|()| TransferStep::for_config(config, self.factory.as_ref()))
        {
            Ok(step) => step,
            Err(e) => {
                tracing::error!("Config '{}' cannot run: {}", config.name, e);
                result.fail(e.to_string());
                return ConfigOutcome {
                    result,
                    fatal: None,
                };
            }
        };

        let candidates = match self.with_retry("list source", || step.candidates()).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!("Listing source of config '{}' failed: {}", config.name, e);
                result.fail(e.to_string());
                let fatal = e
                    .is_fatal()
                    .then(|| (config.source_endpoint(), e.to_string()));
                return ConfigOutcome { result, fatal };
            }
        };

        let concurrency =
            config.effective_concurrency(self.settings.default_max_concurrent_transfers);
        tracing::debug!(
            "Config '{}': {} candidate file(s), concurrency {}",
            config.name,
            candidates.len(),
            concurrency
        );

        let ctx = FileContext {
            job_id,
            history_id,
            config,
            step: &step,
            abort: CancellationToken::new(),
        };
        let outcomes: Vec<FileOutcome> = stream::iter(candidates)
            .map(|entry| self.process_file(&ctx, entry))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut fatal = None;
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                FileOutcome::Transferred { bytes } => {
                    result.files_transferred += 1;
                    result.bytes += bytes as i64;
                }
                FileOutcome::Skipped => result.files_skipped += 1,
                FileOutcome::Failed {
                    error,
                    fatal_endpoint,
                } => {
                    result.files_failed += 1;
                    match fatal_endpoint {
                        Some(key) if fatal.is_none() => fatal = Some((key, error.to_string())),
                        _ => {
                            first_error.get_or_insert(error);
                        }
                    }
                }
                FileOutcome::Aborted => {}
            }
        }

        if let Some((_, reason)) = &fatal {
            result.fail(reason.clone());
        } else if let Some(error) = first_error {
            result.fail(format!(
                "{} file(s) failed, first error: {}",
                result.files_failed, error
            ));
        }
        tracing::info!(
            "Config '{}' done: {} transferred, {} skipped, {} failed",
            config.name,
            result.files_transferred,
            result.files_skipped,
            result.files_failed
        );
        ConfigOutcome { result, fatal }
    }

    async fn process_file(&self, ctx: &FileContext<'_>, entry: RemoteEntry) -> FileOutcome {
        if ctx.abort.is_cancelled() {
            return FileOutcome::Aborted;
        }

        let fetched = match self.with_retry("read", || ctx.step.fetch(&entry)).await {
            Ok(fetched) => fetched,
            Err(e) => {
                let endpoint = ctx.config.source_endpoint();
                return self.file_failed(ctx, &entry, "", None, e, endpoint).await;
            }
        };

        if ctx.config.skip_processed_files {
            let original_path = ctx.step.source_path(&entry);
            match self
                .metadata
                .lookup_processed(ctx.job_id, ctx.config.id, &original_path, &fetched.hash)
                .await
            {
                Ok(Some(prior)) => {
                    tracing::debug!(
                        "Skipping {} (processed at {})",
                        original_path,
                        prior.processed_time
                    );
                    return FileOutcome::Skipped;
                }
                Ok(None) => {}
                Err(e) => {
                    let endpoint = ctx.config.source_endpoint();
                    return self
                        .file_failed(ctx, &entry, &fetched.hash, None, e, endpoint)
                        .await;
                }
            }
        }

        let name = ctx.step.destination_name(&entry.name, Utc::now());
        let destination_path = ctx.step.destination_path(&name);
        let bytes = match self
            .with_retry("write", || ctx.step.deliver(&fetched, &name))
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                let endpoint = ctx.config.destination_endpoint();
                return self
                    .file_failed(ctx, &entry, &fetched.hash, None, e, endpoint)
                    .await;
            }
        };

        let status = match self.with_retry("archive", || ctx.step.finish(&fetched)).await {
            Ok(status) => status,
            Err(e) => {
                let error = AppError::new(
                    e.kind,
                    format!("Transferred but post-processing failed: {}", e.message),
                );
                let endpoint = ctx.config.source_endpoint();
                return self
                    .file_failed(
                        ctx,
                        &entry,
                        &fetched.hash,
                        Some(&destination_path),
                        error,
                        endpoint,
                    )
                    .await;
            }
        };

        let record = file_record(ctx, &fetched, &destination_path, status, None);
        if let Err(e) = self.metadata.record(&record).await {
            tracing::error!(
                "Failed to record transfer of {}: {}",
                record.original_path,
                e
            );
            return FileOutcome::Failed {
                error: e,
                fatal_endpoint: None,
            };
        }
        tracing::debug!(
            "Transferred {} -> {} ({} bytes, {})",
            record.original_path,
            destination_path,
            bytes,
            status
        );
        FileOutcome::Transferred { bytes }
    }

    /// Record a per-file failure. Authentication failures abort the config
    /// and are reported on the config instead of per file.
    async fn file_failed(
        &self,
        ctx: &FileContext<'_>,
        entry: &RemoteEntry,
        hash: &str,
        destination_path: Option<&str>,
        error: AppError,
        endpoint: EndpointKey,
    ) -> FileOutcome {
        if error.is_fatal() {
            ctx.abort.cancel();
            tracing::error!(
                "Aborting config '{}' on {}: {}",
                ctx.config.name,
                entry.path,
                error
            );
            return FileOutcome::Failed {
                error,
                fatal_endpoint: Some(endpoint),
            };
        }

        tracing::warn!("File {} failed: {}", entry.path, error);
        let fetched = FetchedFile {
            entry: entry.clone(),
            data: Default::default(),
            hash: hash.to_string(),
        };
        let mut record = file_record(
            ctx,
            &fetched,
            destination_path.unwrap_or_default(),
            FileStatus::Error,
            Some(error.to_string()),
        );
        record.file_size = entry.size_bytes as i64;
        if let Err(e) = self.metadata.record(&record).await {
            tracing::error!("Failed to record error for {}: {}", entry.path, e);
        }
        FileOutcome::Failed {
            error,
            fatal_endpoint: None,
        }
    }

    /// Retry `op` with exponential backoff while it fails with a retryable
    /// error.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.settings.transfer_retry_attempts => {
                    let delay = self
                        .settings
                        .retry_backoff_ms
                        .saturating_mul(1u64 << attempt.min(16));
                    tracing::debug!(
                        "{} failed (attempt {}), retrying in {}ms: {}",
                        what,
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn poisoned_reason<'a>(
    config: &TransferConfig,
    poisoned: &'a HashMap<EndpointKey, String>,
) -> Option<&'a String> {
    poisoned
        .get(&config.source_endpoint())
        .or_else(|| poisoned.get(&config.destination_endpoint()))
}

fn file_record(
    ctx: &FileContext<'_>,
    file: &FetchedFile,
    destination_path: &str,
    status: FileStatus,
    error_message: Option<String>,
) -> FileMetadata {
    FileMetadata {
        id: Uuid::new_v4(),
        job_id: ctx.job_id,
        config_id: ctx.config.id,
        history_id: ctx.history_id,
        file_name: file.entry.name.clone(),
        file_size: file.data.len() as i64,
        file_hash: file.hash.clone(),
        original_path: ctx.step.source_path(&file.entry),
        destination_path: destination_path.to_string(),
        status,
        processed_time: Utc::now(),
        creation_time: file.entry.created,
        mod_time: file.entry.modified,
        error_message,
    }
}
