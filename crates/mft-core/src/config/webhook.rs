//! Outbound webhook configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by every webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Fixed delay before the single retry, in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// `User-Agent` header sent with every delivery.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            retry_delay_ms: default_retry_delay(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_retry_delay() -> u64 {
    2000
}

fn default_user_agent() -> String {
    format!("mft-engine/{}", env!("CARGO_PKG_VERSION"))
}
