//! Scheduled job domain entities.

pub mod model;

pub use model::Job;
