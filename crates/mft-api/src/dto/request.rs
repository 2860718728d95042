//! Request DTOs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mft_entity::{Job, ProviderType, TransferConfig};

/// Body of `PUT /api/jobs/{id}/enabled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetEnabledRequest {
    /// Desired state.
    pub enabled: bool,
}

/// Body for creating or replacing a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Display name.
    pub name: String,
    /// Cron expression.
    pub schedule: String,
    /// Transfer configs in execution order.
    pub config_ids: Vec<Uuid>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_enabled: bool,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    /// JSON object of extra headers, as a string.
    pub webhook_headers: Option<String>,
    #[serde(default)]
    pub notify_on_success: bool,
    #[serde(default)]
    pub notify_on_failure: bool,
}

impl JobRequest {
    /// A new job from this request.
    pub fn into_job(self) -> Job {
        let mut job = Job::new(self.name.clone(), self.schedule.clone(), Vec::new());
        self.apply(&mut job);
        job
    }

    /// Overwrite the editable fields of `job`. Schedule times are kept.
    pub fn apply(self, job: &mut Job) {
        job.name = self.name;
        job.schedule = self.schedule;
        job.config_ids = self.config_ids;
        job.enabled = self.enabled;
        job.webhook_enabled = self.webhook_enabled;
        job.webhook_url = self.webhook_url;
        if self.webhook_secret.is_some() {
            job.webhook_secret = self.webhook_secret;
        }
        job.webhook_headers = self.webhook_headers;
        job.notify_on_success = self.notify_on_success;
        job.notify_on_failure = self.notify_on_failure;
        job.updated_at = Utc::now();
    }
}

/// Body for creating a transfer config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub name: String,
    pub source_type: ProviderType,
    pub source_path: String,
    #[serde(default)]
    pub source_credentials: serde_json::Value,
    pub destination_type: ProviderType,
    pub destination_path: String,
    #[serde(default)]
    pub dest_credentials: serde_json::Value,
    pub file_pattern: Option<String>,
    pub output_pattern: Option<String>,
    #[serde(default)]
    pub archive_enabled: bool,
    pub archive_path: Option<String>,
    #[serde(default)]
    pub delete_after_transfer: bool,
    #[serde(default = "default_true")]
    pub skip_processed_files: bool,
    #[serde(default)]
    pub max_concurrent_transfers: i32,
    pub rclone_flags: Option<String>,
    pub command_id: Option<i32>,
}

impl ConfigRequest {
    /// A new config from this request.
    pub fn into_config(self) -> TransferConfig {
        let mut config = TransferConfig::new(self.name, &self.source_path, &self.destination_path);
        config.source_type = self.source_type;
        config.source_credentials = object_or_empty(self.source_credentials);
        config.destination_type = self.destination_type;
        config.dest_credentials = object_or_empty(self.dest_credentials);
        config.file_pattern = self.file_pattern;
        config.output_pattern = self.output_pattern;
        config.archive_enabled = self.archive_enabled;
        config.archive_path = self.archive_path;
        config.delete_after_transfer = self.delete_after_transfer;
        config.skip_processed_files = self.skip_processed_files;
        config.max_concurrent_transfers = self.max_concurrent_transfers;
        config.rclone_flags = self.rclone_flags;
        config.command_id = self.command_id;
        config
    }
}

fn object_or_empty(value: serde_json::Value) -> serde_json::Value {
    if value.is_null() {
        serde_json::json!({})
    } else {
        value
    }
}

fn default_true() -> bool {
    true
}
