//! Execution history handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use uuid::Uuid;

use mft_core::types::PageResponse;
use mft_entity::{FileMetadata, JobHistory};

use crate::dto::response::ApiResponse;
use crate::error::ApiResult;
use crate::extractors::PaginationParams;
use crate::state::AppState;

/// GET /api/jobs/{id}/history
pub async fn list_for_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<PageResponse<JobHistory>>>> {
    let page = state
        .engine
        .service
        .history(job_id, params.into_page_request())
        .await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// GET /api/history/{id}
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<JobHistory>>> {
    let history = state.engine.service.execution(id).await?;
    Ok(Json(ApiResponse::ok(history)))
}

/// GET /api/history/{id}/files
pub async fn list_files(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Vec<FileMetadata>>>> {
    let files = state.engine.service.files(id).await?;
    Ok(Json(ApiResponse::ok(files)))
}
