//! Core traits defined in `mft-core` and implemented by other crates.

pub mod provider;

pub use provider::{RemoteEntry, TransferProvider};
