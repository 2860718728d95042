//! Transfer provider trait for pluggable source/destination backends.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::result::AppResult;

/// One entry returned by [`TransferProvider::list`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RemoteEntry {
    /// Path relative to the provider root.
    pub path: String,
    /// Final path component.
    pub name: String,
    /// Size in bytes (0 for directories).
    pub size_bytes: u64,
    /// Last modification time, if the backend reports one.
    pub modified: Option<DateTime<Utc>>,
    /// Creation time, if the backend reports one.
    pub created: Option<DateTime<Utc>>,
    /// Whether this entry is a directory.
    pub is_directory: bool,
}

/// Capability set every source/destination backend implements.
///
/// Paths are relative to the root the provider was built with. Errors use
/// `ErrorKind::ProviderAuth` for rejected credentials and
/// `ErrorKind::ProviderConnection` for anything that may succeed on retry.
#[async_trait]
pub trait TransferProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local", "sftp").
    fn provider_type(&self) -> &str;

    /// Whether the backend negotiates FTP passive mode.
    fn supports_passive_mode(&self) -> bool {
        false
    }

    /// Whether the backend refreshes OAuth tokens on its own.
    fn supports_oauth_refresh(&self) -> bool {
        false
    }

    /// List the entries of a directory (non-recursive).
    async fn list(&self, dir: &str) -> AppResult<Vec<RemoteEntry>>;

    /// Read a whole file into memory.
    async fn read(&self, path: &str) -> AppResult<Bytes>;

    /// Write a file, creating parent directories. Returns the bytes written.
    async fn write(&self, path: &str, data: Bytes) -> AppResult<u64>;

    /// Delete a file. Deleting a missing file is not an error.
    async fn delete(&self, path: &str) -> AppResult<()>;
}
