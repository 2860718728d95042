//! # mft-api
//!
//! Admin HTTP API for the transfer engine built on Axum.
//!
//! Exposes job listing, manual runs, duplication, the enable toggle,
//! execution history, file records and config management as JSON
//! endpoints under `/api`.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, serve};
pub use error::{ApiError, ApiResult};
pub use state::AppState;
