//! # mft-storage
//!
//! Transfer providers for the engine. The local filesystem is accessed
//! natively; every remote provider type is reached through the `rclone`
//! binary. Also hosts the file-selection and output-naming rules and the
//! content hash used for skip-processed lookups.

pub mod factory;
pub mod hash;
pub mod pattern;
pub mod providers;
pub mod transfer;

pub use factory::{DefaultProviderFactory, EndpointSpec, ProviderFactory};
pub use pattern::{FilePattern, OutputPattern};
pub use providers::{LocalProvider, RcloneProvider};
pub use transfer::{FetchedFile, TransferStep};
