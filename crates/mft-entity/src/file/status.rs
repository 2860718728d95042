//! File processing status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of processing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "file_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Transferred; source left in place.
    Processed,
    /// Transferred and copied into the archive directory.
    Archived,
    /// Transferred and removed from the source.
    Deleted,
    /// Transferred, archived, then removed from the source.
    ArchivedAndDeleted,
    /// Processing failed.
    Error,
}

impl FileStatus {
    /// Status after a successful transfer with the given post-actions.
    pub fn after_transfer(archived: bool, deleted: bool) -> Self {
        match (archived, deleted) {
            (false, false) => Self::Processed,
            (true, false) => Self::Archived,
            (false, true) => Self::Deleted,
            (true, true) => Self::ArchivedAndDeleted,
        }
    }

    /// Whether the file counts as processed for skip-processed lookups.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error)
    }

    /// Return the status as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
            Self::ArchivedAndDeleted => "archived_and_deleted",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
