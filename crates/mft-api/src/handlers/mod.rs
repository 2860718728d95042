//! HTTP request handlers, organized by resource.

pub mod configs;
pub mod health;
pub mod history;
pub mod jobs;
