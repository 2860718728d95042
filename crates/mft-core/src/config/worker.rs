//! Scheduler and executor configuration.

use serde::{Deserialize, Serialize};

/// How far a provider authentication failure reaches within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FatalErrorScope {
    /// Abort the failing config only; later configs still run.
    CurrentConfig,
    /// Also skip every remaining config that uses the same provider and
    /// credentials.
    #[default]
    SharedProvider,
}

/// Scheduler loop and transfer executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Interval in milliseconds between scheduler ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// File-level parallelism used when a config does not set its own.
    #[serde(default = "default_max_concurrent")]
    pub default_max_concurrent_transfers: usize,
    /// Extra attempts for a file after a provider connection error.
    #[serde(default = "default_retry_attempts")]
    pub transfer_retry_attempts: u32,
    /// Base backoff in milliseconds, doubled on every retry.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Reach of provider authentication failures.
    #[serde(default)]
    pub fatal_error_scope: FatalErrorScope,
    /// Seconds to wait for in-flight executions on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            default_max_concurrent_transfers: default_max_concurrent(),
            transfer_retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            fatal_error_scope: FatalErrorScope::default(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

fn default_tick_interval() -> u64 {
    1000
}

fn default_max_concurrent() -> usize {
    4
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_shutdown_grace() -> u64 {
    30
}
