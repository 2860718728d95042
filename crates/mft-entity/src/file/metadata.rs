//! File metadata entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::FileStatus;

/// One record of a single file's processing outcome. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileMetadata {
    /// Unique record identifier.
    pub id: Uuid,
    /// Job that processed the file.
    pub job_id: Uuid,
    /// Config that processed the file.
    pub config_id: Uuid,
    /// Execution that produced this record.
    pub history_id: Uuid,
    /// File name on the source.
    pub file_name: String,
    /// Size in bytes.
    pub file_size: i64,
    /// Hex SHA-256 of the content (empty if it could not be read).
    pub file_hash: String,
    /// Full path on the source.
    pub original_path: String,
    /// Full path on the destination.
    pub destination_path: String,
    /// Processing outcome.
    pub status: FileStatus,
    /// When the record was written.
    pub processed_time: DateTime<Utc>,
    /// Source creation time, if the provider reports it.
    pub creation_time: Option<DateTime<Utc>>,
    /// Source modification time, if the provider reports it.
    pub mod_time: Option<DateTime<Utc>>,
    /// Error text for `Error` records.
    pub error_message: Option<String>,
}

impl FileMetadata {
    /// Whether this record satisfies a skip-processed lookup.
    pub fn is_processed(&self) -> bool {
        self.status.is_success()
    }
}
