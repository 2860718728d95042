//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use mft_core::config::AppConfig;
use mft_worker::Engine;

/// Application state passed to every handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Scheduler, runner and job service.
    pub engine: Engine,
    /// Process start, for the health endpoint.
    pub started_at: Instant,
}

impl AppState {
    /// Create the state.
    pub fn new(config: AppConfig, engine: Engine) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            started_at: Instant::now(),
        }
    }
}
