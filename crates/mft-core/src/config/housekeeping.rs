//! History retention configuration.

use serde::{Deserialize, Serialize};

/// Periodic pruning of old history and file metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HousekeepingConfig {
    /// Whether the pruning task is scheduled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression (with seconds) for the pruning task.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    /// Rows older than this many days are removed; 0 keeps everything.
    #[serde(default = "default_retention")]
    pub history_retention_days: u32,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_schedule(),
            history_retention_days: default_retention(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_schedule() -> String {
    "0 30 3 * * *".to_string()
}

fn default_retention() -> u32 {
    90
}
