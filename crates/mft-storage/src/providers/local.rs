//! Local filesystem transfer provider.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;

use mft_core::error::{AppError, ErrorKind};
use mft_core::result::AppResult;
use mft_core::traits::{RemoteEntry, TransferProvider};

/// Provider over a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    /// Create a provider rooted at `root`. The directory is not created
    /// until something is written.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path inside the root, rejecting `..`.
    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(AppError::validation(format!(
                "Path escapes provider root: {path}"
            )));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

fn join_relative(dir: &str, name: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

fn io_error(action: &str, path: &str, e: std::io::Error) -> AppError {
    if e.kind() == std::io::ErrorKind::NotFound {
        AppError::not_found(format!("File not found: {path}"))
    } else {
        AppError::with_source(ErrorKind::Storage, format!("Failed to {action}: {path}"), e)
    }
}

#[async_trait]
impl TransferProvider for LocalProvider {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn list(&self, dir: &str) -> AppResult<Vec<RemoteEntry>> {
        let full = self.resolve(dir)?;
        let mut reader = match fs::read_dir(&full).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("list directory", dir, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| io_error("read directory entry", dir, e))?
        {
            let meta = entry
                .metadata()
                .await
                .map_err(|e| io_error("stat entry", dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            entries.push(RemoteEntry {
                path: join_relative(dir, &name),
                name,
                size_bytes: if meta.is_file() { meta.len() } else { 0 },
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
                created: meta.created().ok().map(DateTime::<Utc>::from),
                is_directory: meta.is_dir(),
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn read(&self, path: &str) -> AppResult<Bytes> {
        let full = self.resolve(path)?;
        let data = fs::read(&full)
            .await
            .map_err(|e| io_error("read file", path, e))?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, path: &str, data: Bytes) -> AppResult<u64> {
        let full = self.resolve(path)?;
        Self::ensure_parent(&full).await?;

        // Readers never observe a half-written file.
        let mut partial = full.clone().into_os_string();
        partial.push(".partial");
        fs::write(&partial, &data)
            .await
            .map_err(|e| io_error("write file", path, e))?;
        fs::rename(&partial, &full)
            .await
            .map_err(|e| io_error("finalize file", path, e))?;

        debug!(path, bytes = data.len(), "Wrote local file");
        Ok(data.len() as u64)
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete file", path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_list_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalProvider::new(dir.path());

        provider.write("b.txt", Bytes::from("bb")).await.unwrap();
        provider.write("a.txt", Bytes::from("a")).await.unwrap();
        provider.write("sub/c.txt", Bytes::from("c")).await.unwrap();

        let entries = provider.list("").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
        assert!(entries[2].is_directory);
        assert_eq!(entries[1].size_bytes, 2);

        assert_eq!(provider.read("sub/c.txt").await.unwrap(), Bytes::from("c"));

        provider.delete("a.txt").await.unwrap();
        provider.delete("a.txt").await.unwrap();
        assert_eq!(provider.list("").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_dir_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalProvider::new(dir.path().join("nope"));
        assert!(provider.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalProvider::new(dir.path());

        let err = provider.read("../etc/passwd").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
