//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every section has defaults so a missing file still yields
//! a runnable configuration.

pub mod app;
pub mod database;
pub mod housekeeping;
pub mod logging;
pub mod storage;
pub mod webhook;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::app::{CorsConfig, ServerConfig};
pub use self::database::{DatabaseConfig, StoreProvider};
pub use self::housekeeping::HousekeepingConfig;
pub use self::logging::LoggingConfig;
pub use self::storage::StorageConfig;
pub use self::webhook::WebhookConfig;
pub use self::worker::{FatalErrorScope, WorkerConfig};

use crate::error::AppError;

/// Prefix for environment variable overrides (`MFT__WORKER__TICK_INTERVAL_MS`).
const ENV_PREFIX: &str = "MFT";

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Admin API server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Scheduler and executor settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Webhook delivery settings.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Transfer provider settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// History retention settings.
    #[serde(default)]
    pub housekeeping: HousekeepingConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration for an environment.
    ///
    /// Merges `config/default`, the `config/{env}` overlay, and environment
    /// variables prefixed with `MFT__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(env_source())
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Load configuration from a single explicit file plus environment
    /// overrides.
    pub fn load_from(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(env_source())
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_files() {
        let config = AppConfig::load_from("does/not/exist").unwrap();
        assert_eq!(config.database.provider, StoreProvider::Postgres);
        assert_eq!(config.worker.fatal_error_scope, FatalErrorScope::SharedProvider);
        assert_eq!(config.worker.default_max_concurrent_transfers, 4);
        assert_eq!(config.housekeeping.history_retention_days, 90);
    }

    #[test]
    fn test_fatal_scope_names() {
        let scope: FatalErrorScope = serde_json::from_str("\"current_config\"").unwrap();
        assert_eq!(scope, FatalErrorScope::CurrentConfig);
        let provider: StoreProvider = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(provider, StoreProvider::Memory);
    }
}
