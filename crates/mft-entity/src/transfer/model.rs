//! Transfer config entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use mft_core::error::AppError;
use mft_core::result::AppResult;

use super::provider::ProviderType;

/// A named source → destination connection definition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransferConfig {
    /// Unique config identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Source provider type.
    pub source_type: ProviderType,
    /// Directory on the source to scan.
    pub source_path: String,
    /// Source credentials (JSON object, keys depend on `source_type`).
    #[serde(default)]
    pub source_credentials: serde_json::Value,
    /// Destination provider type.
    pub destination_type: ProviderType,
    /// Directory on the destination to write into.
    pub destination_path: String,
    /// Destination credentials (JSON object, keys depend on `destination_type`).
    #[serde(default)]
    pub dest_credentials: serde_json::Value,
    /// Glob selecting source files (empty = all files).
    pub file_pattern: Option<String>,
    /// Template for destination file names (empty = keep original name).
    pub output_pattern: Option<String>,
    /// Copy the source file into `archive_path` after a successful transfer.
    pub archive_enabled: bool,
    /// Archive directory on the source provider.
    pub archive_path: Option<String>,
    /// Remove the source file after a successful transfer.
    pub delete_after_transfer: bool,
    /// Skip files already recorded as processed for this config.
    pub skip_processed_files: bool,
    /// File-level parallelism (0 = engine default).
    pub max_concurrent_transfers: i32,
    /// Extra rclone flags, whitespace separated.
    pub rclone_flags: Option<String>,
    /// Reference into the external rclone command catalogue.
    pub command_id: Option<i32>,
    /// When the config was created.
    pub created_at: DateTime<Utc>,
    /// When the config was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Identity of one provider endpoint: type plus the exact credentials.
///
/// Two configs with equal keys hit the same account, so an authentication
/// failure on one applies to the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    /// Provider type.
    pub provider_type: ProviderType,
    /// Canonical JSON of the credentials (keys sorted).
    credentials: String,
}

impl EndpointKey {
    /// Build a key from a type and its credential object.
    pub fn new(provider_type: ProviderType, credentials: &serde_json::Value) -> Self {
        Self {
            provider_type,
            credentials: credentials.to_string(),
        }
    }
}

impl TransferConfig {
    /// Create a local → local config with engine defaults.
    pub fn new(name: impl Into<String>, source_path: &str, destination_path: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source_type: ProviderType::Local,
            source_path: source_path.to_string(),
            source_credentials: serde_json::json!({}),
            destination_type: ProviderType::Local,
            destination_path: destination_path.to_string(),
            dest_credentials: serde_json::json!({}),
            file_pattern: None,
            output_pattern: None,
            archive_enabled: false,
            archive_path: None,
            delete_after_transfer: false,
            skip_processed_files: false,
            max_concurrent_transfers: 0,
            rclone_flags: None,
            command_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Endpoint identity of the source side.
    pub fn source_endpoint(&self) -> EndpointKey {
        EndpointKey::new(self.source_type, &self.source_credentials)
    }

    /// Endpoint identity of the destination side.
    pub fn destination_endpoint(&self) -> EndpointKey {
        EndpointKey::new(self.destination_type, &self.dest_credentials)
    }

    /// File-level parallelism, falling back to `default` when unset.
    pub fn effective_concurrency(&self, default: usize) -> usize {
        if self.max_concurrent_transfers > 0 {
            self.max_concurrent_transfers as usize
        } else {
            default.max(1)
        }
    }

    /// Parsed rclone flags.
    pub fn rclone_flag_list(&self) -> Vec<String> {
        self.rclone_flags
            .as_deref()
            .map(|f| f.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Validate the fields relevant to the selected provider types.
    pub fn validate(&self) -> AppResult<()> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("name must not be empty".to_string());
        }
        if self.max_concurrent_transfers < 0 {
            problems.push("max_concurrent_transfers must not be negative".to_string());
        }
        if self.archive_enabled
            && self
                .archive_path
                .as_deref()
                .is_none_or(|p| p.trim().is_empty())
        {
            problems.push("archive_path is required when archiving is enabled".to_string());
        }
        if self.source_type == ProviderType::Local && self.source_path.trim().is_empty() {
            problems.push("source_path is required for local sources".to_string());
        }
        if self.destination_type == ProviderType::Local && self.destination_path.trim().is_empty()
        {
            problems.push("destination_path is required for local destinations".to_string());
        }
        if let Some(pattern) = self.output_pattern.as_deref().map(str::trim) {
            if !pattern.is_empty()
                && !pattern.contains("${filename}")
                && !pattern.contains("${name}")
            {
                problems.push(
                    "output_pattern must contain ${filename} or ${name}".to_string(),
                );
            }
        }
        for missing in self.source_type.missing_credentials(&self.source_credentials) {
            problems.push(format!(
                "source credential '{missing}' is required for {}",
                self.source_type
            ));
        }
        for missing in self.destination_type.missing_credentials(&self.dest_credentials) {
            problems.push(format!(
                "destination credential '{missing}' is required for {}",
                self.destination_type
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(format!(
                "Invalid transfer config '{}': {}",
                self.name,
                problems.join("; ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_local_config_is_valid() {
        let config = TransferConfig::new("nightly", "/in", "/out");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_archive_requires_path() {
        let mut config = TransferConfig::new("nightly", "/in", "/out");
        config.archive_enabled = true;
        let err = config.validate().unwrap_err();
        assert!(err.message.contains("archive_path"));
    }

    #[test]
    fn test_output_pattern_must_vary_per_file() {
        let mut config = TransferConfig::new("nightly", "/in", "/out");
        config.output_pattern = Some("daily.csv".into());
        let err = config.validate().unwrap_err();
        assert!(err.message.contains("output_pattern"));

        config.output_pattern = Some("${name}_${date:%Y%m%d}.${ext}".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validates_only_selected_type() {
        let mut config = TransferConfig::new("to-sftp", "/in", "upload");
        config.destination_type = ProviderType::Sftp;
        config.dest_credentials = json!({"host": "sftp.example.com", "bucket": "ignored"});
        let err = config.validate().unwrap_err();
        assert!(err.message.contains("'user'"));
        assert!(!err.message.contains("bucket"));
    }

    #[test]
    fn test_endpoint_key_ignores_key_order() {
        let a = EndpointKey::new(ProviderType::Sftp, &json!({"host": "h", "user": "u"}));
        let b = EndpointKey::new(ProviderType::Sftp, &json!({"user": "u", "host": "h"}));
        let c = EndpointKey::new(ProviderType::Ftp, &json!({"user": "u", "host": "h"}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_effective_concurrency() {
        let mut config = TransferConfig::new("c", "/in", "/out");
        assert_eq!(config.effective_concurrency(4), 4);
        assert_eq!(config.effective_concurrency(0), 1);
        config.max_concurrent_transfers = 8;
        assert_eq!(config.effective_concurrency(4), 8);
    }
}
