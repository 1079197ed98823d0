use axum::extract::{Path, Query, State};
use serde::Serialize;

use crate::api::validation::{validate_id, validate_page, PageQuery};
use crate::app::AppState;
use crate::database::models::{Position, PositionWithChildren, TreeNode};
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct PositionList {
    pub data: Vec<Position>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// GET /positions?page&limit
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<PositionList> {
    let (page, limit) = validate_page(&query, &state.config.api)?;
    let result = state.positions.find_all(page, limit).await?;

    Ok(ApiResponse::success(PositionList {
        data: result.data,
        total: result.total,
        page,
        limit,
    }))
}

/// GET /positions/tree - every position with its direct children
pub async fn tree(State(state): State<AppState>) -> ApiResult<Vec<PositionWithChildren>> {
    Ok(ApiResponse::success(state.positions.find_all_as_tree().await?))
}

/// GET /positions/tree/nested
pub async fn nested_tree(State(state): State<AppState>) -> ApiResult<Vec<TreeNode>> {
    Ok(ApiResponse::success(state.positions.find_all_nested().await?))
}

/// GET /positions/:id - accepts an id or a name
pub async fn get(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult<Position> {
    Ok(ApiResponse::success(state.positions.find_one(&identifier).await?))
}

/// GET /positions/:id/children
pub async fn children(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Position>> {
    let id = validate_id(&id)?;
    Ok(ApiResponse::success(state.positions.find_children(id).await?))
}

/// GET /positions/:id/ancestors - nearest first
pub async fn ancestors(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Position>> {
    let id = validate_id(&id)?;
    Ok(ApiResponse::success(state.positions.ancestors(id).await?))
}
