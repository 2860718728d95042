//! Job management handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use mft_entity::{Job, JobHistory};

use crate::dto::request::{JobRequest, SetEnabledRequest};
use crate::dto::response::{ApiResponse, MessageResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/jobs
pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Vec<Job>>>> {
    let jobs = state.engine.service.list().await?;
    Ok(Json(ApiResponse::ok(jobs)))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Job>>> {
    let job = state.engine.service.get(id).await?;
    Ok(Json(ApiResponse::ok(job)))
}

/// POST /api/jobs
pub async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<JobRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Job>>)> {
    let job = state.engine.service.create(req.into_job()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(job))))
}

/// PUT /api/jobs/{id}
pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<JobRequest>,
) -> ApiResult<Json<ApiResponse<Job>>> {
    let mut job = state.engine.service.get(id).await?;
    req.apply(&mut job);
    let job = state.engine.service.update(job).await?;
    Ok(Json(ApiResponse::ok(job)))
}

/// DELETE /api/jobs/{id}
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<MessageResponse>>> {
    state.engine.service.delete(id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse {
        message: format!("Job {id} deleted"),
    })))
}

/// PUT /api/jobs/{id}/enabled
pub async fn set_enabled(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetEnabledRequest>,
) -> ApiResult<Json<ApiResponse<Job>>> {
    let job = state.engine.service.set_enabled(id, req.enabled).await?;
    Ok(Json(ApiResponse::ok(job)))
}

/// POST /api/jobs/{id}/duplicate
pub async fn duplicate_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Job>>)> {
    let job = state.engine.service.duplicate(id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(job))))
}

/// POST /api/jobs/{id}/run
///
/// Returns the running history row; the execution continues in the background.
pub async fn run_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ApiResponse<JobHistory>>)> {
    let history = state.engine.service.run_now(id).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::ok(history))))
}
