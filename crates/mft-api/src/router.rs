//! Route definitions for the MFT HTTP API.
//!
//! All routes are mounted under `/api` and receive `AppState` through
//! Axum's `State` extractor.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the router with all routes and request logging.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(health_routes())
        .merge(job_routes())
        .merge(history_routes())
        .merge(config_routes());

    Router::new()
        .nest("/api", api_routes)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

fn job_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/jobs",
            get(handlers::jobs::list_jobs).post(handlers::jobs::create_job),
        )
        .route(
            "/jobs/{id}",
            get(handlers::jobs::get_job)
                .put(handlers::jobs::update_job)
                .delete(handlers::jobs::delete_job),
        )
        .route("/jobs/{id}/run", post(handlers::jobs::run_job))
        .route("/jobs/{id}/duplicate", post(handlers::jobs::duplicate_job))
        .route("/jobs/{id}/enabled", put(handlers::jobs::set_enabled))
        .route("/jobs/{id}/history", get(handlers::history::list_for_job))
}

fn history_routes() -> Router<AppState> {
    Router::new()
        .route("/history/{id}", get(handlers::history::get_execution))
        .route("/history/{id}/files", get(handlers::history::list_files))
}

fn config_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/configs",
            get(handlers::configs::list_configs).post(handlers::configs::create_config),
        )
        .route(
            "/configs/{id}",
            axum::routing::delete(handlers::configs::delete_config),
        )
}
