//! Processed-file bookkeeping entities.

pub mod metadata;
pub mod status;

pub use metadata::FileMetadata;
pub use status::FileStatus;
