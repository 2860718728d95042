//! Provider construction from transfer config endpoints.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use mft_core::config::StorageConfig;
use mft_core::result::AppResult;
use mft_core::traits::TransferProvider;
use mft_entity::{EndpointKey, ProviderType, TransferConfig};

use crate::providers::{LocalProvider, RcloneProvider};

/// Everything needed to build one provider instance.
#[derive(Debug, Clone)]
pub struct EndpointSpec<'a> {
    /// Provider type.
    pub provider_type: ProviderType,
    /// Root path on the provider.
    pub root: &'a str,
    /// Credential object for the type.
    pub credentials: &'a serde_json::Value,
    /// Extra rclone flags.
    pub flags: Vec<String>,
}

impl<'a> EndpointSpec<'a> {
    /// The source side of a config.
    pub fn source(config: &'a TransferConfig) -> Self {
        Self {
            provider_type: config.source_type,
            root: &config.source_path,
            credentials: &config.source_credentials,
            flags: config.rclone_flag_list(),
        }
    }

    /// The destination side of a config.
    pub fn destination(config: &'a TransferConfig) -> Self {
        Self {
            provider_type: config.destination_type,
            root: &config.destination_path,
            credentials: &config.dest_credentials,
            flags: config.rclone_flag_list(),
        }
    }

    /// The archive directory on the source side, if archiving is enabled.
    pub fn archive(config: &'a TransferConfig) -> Option<Self> {
        let path = config.archive_path.as_deref()?;
        config.archive_enabled.then(|| Self {
            root: path,
            ..Self::source(config)
        })
    }

    /// Identity of the endpoint's account.
    pub fn key(&self) -> EndpointKey {
        EndpointKey::new(self.provider_type, self.credentials)
    }
}

/// Builds providers for endpoints. Selected once at startup; tests swap in
/// their own implementation.
pub trait ProviderFactory: Send + Sync + Debug + 'static {
    /// Build the provider for one endpoint.
    fn build(&self, spec: &EndpointSpec<'_>) -> AppResult<Arc<dyn TransferProvider>>;
}

/// Local endpoints use the filesystem; every other type goes through rclone.
#[derive(Debug, Clone)]
pub struct DefaultProviderFactory {
    config: StorageConfig,
}

impl DefaultProviderFactory {
    /// Create a factory from the storage configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn build(&self, spec: &EndpointSpec<'_>) -> AppResult<Arc<dyn TransferProvider>> {
        debug!(provider = %spec.provider_type, root = spec.root, "Building provider");
        match spec.provider_type {
            ProviderType::Local => Ok(Arc::new(LocalProvider::new(spec.root))),
            other => Ok(Arc::new(RcloneProvider::new(
                other,
                spec.root,
                spec.credentials,
                &self.config.rclone_binary,
                spec.flags.clone(),
                Duration::from_secs(self.config.rclone_timeout_seconds),
            )?)),
        }
    }
}
