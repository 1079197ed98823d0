use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::api::validation::{
    validate_create, validate_id, validate_update, CreatePositionRequest, UpdatePositionRequest,
};
use crate::app::AppState;
use crate::database::models::Position;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// POST /positions
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreatePositionRequest>, JsonRejection>,
) -> ApiResult<Position> {
    let Json(request) = payload?;
    let input = validate_create(request)?;

    let position = state.positions.create(input).await?;
    tracing::debug!("Position {} created by '{}'", position.id, user.username);

    Ok(ApiResponse::created(position).with_message("Position created successfully"))
}

/// PATCH /positions/:id - fields left out or null keep their value
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<UpdatePositionRequest>, JsonRejection>,
) -> ApiResult<Position> {
    let id = validate_id(&id)?;
    let Json(request) = payload?;
    let patch = validate_update(request)?;

    let position = state.positions.update(id, patch).await?;
    tracing::debug!("Position {} updated by '{}'", id, user.username);

    Ok(ApiResponse::success(position).with_message("Position updated successfully"))
}

/// DELETE /positions/:id - only leaves may be deleted
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = validate_id(&id)?;

    state.positions.remove(id).await?;
    tracing::debug!("Position {} deleted by '{}'", id, user.username);

    Ok(ApiResponse::success(json!({ "id": id })).with_message("Position deleted successfully"))
}
