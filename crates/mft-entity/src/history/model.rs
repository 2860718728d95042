//! Job history entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use super::status::{HistoryStatus, TriggerKind};

/// One record of a job execution.
///
/// Created with `Running` at execution start and finalized exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobHistory {
    /// Unique history identifier.
    pub id: Uuid,
    /// The executed job. Not a foreign key: history outlives deleted jobs.
    pub job_id: Uuid,
    /// Set when the job has exactly one config.
    pub config_id: Option<Uuid>,
    /// Execution status.
    pub status: HistoryStatus,
    /// What started the execution.
    pub trigger: TriggerKind,
    /// When the execution started.
    pub start_time: DateTime<Utc>,
    /// When the execution was finalized.
    pub end_time: Option<DateTime<Utc>>,
    /// Bytes written to destinations across all configs.
    pub bytes_transferred: i64,
    /// Files transferred across all configs.
    pub files_transferred: i32,
    /// Combined error text of the failed configs.
    pub error_message: Option<String>,
    /// Per-config outcomes in execution order.
    pub config_results: Json<Vec<ConfigRunResult>>,
}

/// Outcome of one config within an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRunResult {
    /// Config identifier.
    pub config_id: Uuid,
    /// Config name at snapshot time.
    pub config_name: String,
    /// Zero-based position in the job's config list.
    pub position: usize,
    /// `Completed` or `Failed`.
    pub status: HistoryStatus,
    /// Whether the config was never started because of an earlier fatal error.
    #[serde(default)]
    pub skipped: bool,
    /// Bytes written by this config.
    pub bytes: i64,
    /// Files successfully transferred.
    pub files_transferred: u32,
    /// Files skipped as already processed.
    pub files_skipped: u32,
    /// Files that ended in an error.
    pub files_failed: u32,
    /// Error text, if the config failed.
    pub error: Option<String>,
}

impl ConfigRunResult {
    /// An empty, successful result for a config about to run.
    pub fn new(config_id: Uuid, config_name: impl Into<String>, position: usize) -> Self {
        Self {
            config_id,
            config_name: config_name.into(),
            position,
            status: HistoryStatus::Completed,
            skipped: false,
            bytes: 0,
            files_transferred: 0,
            files_skipped: 0,
            files_failed: 0,
            error: None,
        }
    }

    /// Mark this result failed with the given reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = HistoryStatus::Failed;
        self.error = Some(reason.into());
    }

    /// Whether this config failed.
    pub fn is_failed(&self) -> bool {
        self.status == HistoryStatus::Failed
    }
}

impl JobHistory {
    /// Start a new running execution record.
    pub fn start(job_id: Uuid, config_ids: &[Uuid], trigger: TriggerKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            config_id: match config_ids {
                [only] => Some(*only),
                _ => None,
            },
            status: HistoryStatus::Running,
            trigger,
            start_time: Utc::now(),
            end_time: None,
            bytes_transferred: 0,
            files_transferred: 0,
            error_message: None,
            config_results: Json(Vec::new()),
        }
    }

    /// Whether the execution ended successfully.
    pub fn succeeded(&self) -> bool {
        self.status == HistoryStatus::Completed
    }

    /// Fill in the terminal fields from the per-config results.
    ///
    /// The execution is `Completed` only when no config failed. The error
    /// message joins the failed configs' errors in execution order.
    pub fn finish(&mut self, results: Vec<ConfigRunResult>, now: DateTime<Utc>) {
        let failures: Vec<String> = results
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| {
                format!(
                    "config '{}': {}",
                    r.config_name,
                    r.error.as_deref().unwrap_or("failed")
                )
            })
            .collect();

        self.end_time = Some(now);
        self.bytes_transferred = results.iter().map(|r| r.bytes).sum();
        self.files_transferred = results.iter().map(|r| r.files_transferred as i32).sum();
        self.status = if failures.is_empty() {
            HistoryStatus::Completed
        } else {
            HistoryStatus::Failed
        };
        self.error_message = (!failures.is_empty()).then(|| failures.join("; "));
        self.config_results = Json(results);
    }

    /// Duration of a finalized execution.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_config_sets_config_id() {
        let job = Uuid::new_v4();
        let cfg = Uuid::new_v4();
        let one = JobHistory::start(job, &[cfg], TriggerKind::Manual);
        assert_eq!(one.config_id, Some(cfg));
        assert_eq!(one.status, HistoryStatus::Running);

        let many = JobHistory::start(job, &[cfg, Uuid::new_v4()], TriggerKind::Scheduled);
        assert!(many.config_id.is_none());
    }

    #[test]
    fn test_config_result_fail() {
        let mut result = ConfigRunResult::new(Uuid::new_v4(), "c", 0);
        assert!(!result.is_failed());
        result.fail("auth rejected");
        assert!(result.is_failed());
        assert_eq!(result.error.as_deref(), Some("auth rejected"));
    }

    #[test]
    fn test_finish_summarizes_results() {
        let job = Uuid::new_v4();
        let mut history = JobHistory::start(job, &[], TriggerKind::Scheduled);

        let mut first = ConfigRunResult::new(Uuid::new_v4(), "orders", 0);
        first.bytes = 300;
        first.files_transferred = 3;
        let mut second = ConfigRunResult::new(Uuid::new_v4(), "invoices", 1);
        second.fail("PROVIDER_AUTH: login rejected");

        let now = history.start_time + chrono::Duration::seconds(5);
        history.finish(vec![first, second], now);

        assert_eq!(history.status, HistoryStatus::Failed);
        assert_eq!(history.bytes_transferred, 300);
        assert_eq!(history.files_transferred, 3);
        assert_eq!(
            history.error_message.as_deref(),
            Some("config 'invoices': PROVIDER_AUTH: login rejected")
        );
        assert_eq!(history.duration(), Some(chrono::Duration::seconds(5)));
        assert_eq!(history.config_results.0.len(), 2);
    }

    #[test]
    fn test_finish_without_failures_completes() {
        let mut history = JobHistory::start(Uuid::new_v4(), &[], TriggerKind::Manual);
        let at = history.start_time;
        history.finish(vec![ConfigRunResult::new(Uuid::new_v4(), "a", 0)], at);
        assert!(history.succeeded());
        assert!(history.error_message.is_none());
    }
}
