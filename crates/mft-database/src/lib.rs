//! # mft-database
//!
//! Persistence for the transfer engine. The store traits in [`store`] are
//! implemented twice: PostgreSQL repositories built on `sqlx`, and
//! in-memory stores used for development and tests. [`Stores`] selects the
//! backend from configuration.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;
pub mod stores;

pub use connection::DatabasePool;
pub use store::{ConfigStore, HistoryStore, JobStore, MetadataStore};
pub use stores::Stores;
