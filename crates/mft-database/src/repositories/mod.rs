//! PostgreSQL implementations of the store traits.

pub mod config;
pub mod history;
pub mod job;
pub mod metadata;

pub use config::ConfigRepository;
pub use history::HistoryRepository;
pub use job::JobRepository;
pub use metadata::MetadataRepository;
