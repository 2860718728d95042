//! Health check handler.

use axum::Json;
use axum::extract::State;

use crate::dto::response::{ApiResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let database_ok = match state.engine.stores.health_check().await {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!("Database health check failed: {}", e);
            false
        }
    };

    Json(ApiResponse::ok(HealthResponse {
        status: if database_ok { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        database: if database_ok { "connected" } else { "unavailable" }.to_string(),
        scheduled_jobs: state.engine.scheduler.len(),
    }))
}
