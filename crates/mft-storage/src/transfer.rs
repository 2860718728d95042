//! The provider transfer step for one transfer config.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use mft_core::result::AppResult;
use mft_core::traits::{RemoteEntry, TransferProvider};
use mft_entity::{FileStatus, TransferConfig};

use crate::factory::{EndpointSpec, ProviderFactory};
use crate::hash::sha256_hex;
use crate::pattern::{FilePattern, OutputPattern};

/// A source file read into memory.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    /// The listing entry.
    pub entry: RemoteEntry,
    /// File content.
    pub data: Bytes,
    /// Hex SHA-256 of `data`.
    pub hash: String,
}

/// Providers and naming rules for one config, built from a snapshot.
#[derive(Debug, Clone)]
pub struct TransferStep {
    source: Arc<dyn TransferProvider>,
    destination: Arc<dyn TransferProvider>,
    archive: Option<Arc<dyn TransferProvider>>,
    delete_after_transfer: bool,
    file_pattern: FilePattern,
    output_pattern: OutputPattern,
    source_root: String,
    destination_root: String,
}

impl TransferStep {
    /// Build the step for a config.
    pub fn for_config(config: &TransferConfig, factory: &dyn ProviderFactory) -> AppResult<Self> {
        let file_pattern = FilePattern::new(config.file_pattern.as_deref())?;
        let output_pattern = OutputPattern::new(config.output_pattern.as_deref())?;
        let source = factory.build(&EndpointSpec::source(config))?;
        let destination = factory.build(&EndpointSpec::destination(config))?;
        let archive = EndpointSpec::archive(config)
            .map(|spec| factory.build(&spec))
            .transpose()?;

        Ok(Self {
            source,
            destination,
            archive,
            delete_after_transfer: config.delete_after_transfer,
            file_pattern,
            output_pattern,
            source_root: config.source_path.clone(),
            destination_root: config.destination_path.clone(),
        })
    }

    /// Source files selected by the pattern, in path order.
    pub async fn candidates(&self) -> AppResult<Vec<RemoteEntry>> {
        let listed = self.source.list("").await?;
        let total = listed.len();
        let selected: Vec<_> = listed
            .into_iter()
            .filter(|e| !e.is_directory && self.file_pattern.matches(&e.name))
            .collect();
        debug!(
            listed = total,
            selected = selected.len(),
            pattern = self.file_pattern.as_str(),
            "Selected source files"
        );
        Ok(selected)
    }

    /// Read a source file and hash it.
    pub async fn fetch(&self, entry: &RemoteEntry) -> AppResult<FetchedFile> {
        let data = self.source.read(&entry.path).await?;
        let hash = sha256_hex(&data);
        Ok(FetchedFile {
            entry: entry.clone(),
            data,
            hash,
        })
    }

    /// Destination name (relative to the destination root) for a source file.
    pub fn destination_name(&self, file_name: &str, now: DateTime<Utc>) -> String {
        self.output_pattern.render(file_name, now)
    }

    /// Write a fetched file to the destination.
    pub async fn deliver(&self, file: &FetchedFile, destination_name: &str) -> AppResult<u64> {
        self.destination
            .write(destination_name, file.data.clone())
            .await
    }

    /// Archive and/or delete the source after a successful delivery.
    pub async fn finish(&self, file: &FetchedFile) -> AppResult<FileStatus> {
        if let Some(archive) = &self.archive {
            archive.write(&file.entry.name, file.data.clone()).await?;
        }
        if self.delete_after_transfer {
            self.source.delete(&file.entry.path).await?;
        }
        Ok(FileStatus::after_transfer(
            self.archive.is_some(),
            self.delete_after_transfer,
        ))
    }

    /// Full source path of an entry, as recorded in metadata.
    pub fn source_path(&self, entry: &RemoteEntry) -> String {
        join(&self.source_root, &entry.path)
    }

    /// Full destination path of a destination name.
    pub fn destination_path(&self, destination_name: &str) -> String {
        join(&self.destination_root, destination_name)
    }

    /// The source provider.
    pub fn source(&self) -> &Arc<dyn TransferProvider> {
        &self.source
    }

    /// The destination provider.
    pub fn destination(&self) -> &Arc<dyn TransferProvider> {
        &self.destination
    }
}

fn join(root: &str, path: &str) -> String {
    let root = root.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if root.is_empty() {
        path.to_string()
    } else {
        format!("{root}/{path}")
    }
}
