//! Transfer config handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::dto::request::ConfigRequest;
use crate::dto::response::{ApiResponse, ConfigResponse, MessageResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/configs
pub async fn list_configs(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<ConfigResponse>>>> {
    let configs = state.engine.stores.configs.list().await?;
    Ok(Json(ApiResponse::ok(
        configs.into_iter().map(ConfigResponse::from).collect(),
    )))
}

/// POST /api/configs
pub async fn create_config(
    State(state): State<AppState>,
    Json(req): Json<ConfigRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ConfigResponse>>)> {
    let config = req.into_config();
    config.validate()?;
    let created = state.engine.stores.configs.create(&config).await?;
    tracing::info!("Transfer config '{}' created ({})", created.name, created.id);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created.into()))))
}

/// DELETE /api/configs/{id}
pub async fn delete_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<MessageResponse>>> {
    state.engine.service.delete_config(id).await?;
    Ok(Json(ApiResponse::ok(MessageResponse {
        message: format!("Transfer config {id} deleted"),
    })))
}
