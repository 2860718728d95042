//! Transfer provider implementations.

pub mod local;
pub mod rclone;

pub use local::LocalProvider;
pub use rclone::RcloneProvider;
