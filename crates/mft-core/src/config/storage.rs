//! Transfer provider configuration.

use serde::{Deserialize, Serialize};

/// Settings for building transfer providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path or name of the rclone binary used for remote providers.
    #[serde(default = "default_rclone_binary")]
    pub rclone_binary: String,
    /// Timeout in seconds for a single rclone invocation.
    #[serde(default = "default_rclone_timeout")]
    pub rclone_timeout_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            rclone_binary: default_rclone_binary(),
            rclone_timeout_seconds: default_rclone_timeout(),
        }
    }
}

fn default_rclone_binary() -> String {
    "rclone".to_string()
}

fn default_rclone_timeout() -> u64 {
    600
}
