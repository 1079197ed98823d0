use axum::extract::State;

use crate::app::AppState;
use crate::database::models::PublicPositionView;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /positions/public/list - positions flagged public, newest first
pub async fn public_list(State(state): State<AppState>) -> ApiResult<Vec<PublicPositionView>> {
    let positions = state.positions.public_list().await?;
    Ok(ApiResponse::success(positions))
}
