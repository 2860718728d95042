//! # mft-entity
//!
//! Domain entity models for the managed file transfer engine. Every struct
//! in this crate represents a database table row or a domain value object.
//! Database entities additionally derive `sqlx::FromRow`.

pub mod file;
pub mod history;
pub mod job;
pub mod transfer;

pub use file::{FileMetadata, FileStatus};
pub use history::{ConfigRunResult, HistoryStatus, JobHistory, TriggerKind};
pub use job::Job;
pub use transfer::{EndpointKey, ProviderType, TransferConfig};
