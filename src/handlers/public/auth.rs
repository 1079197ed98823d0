// handlers/public/auth.rs - POST /auth/login

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::LoginResponse;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /auth/login - exchange credentials for a bearer token
///
/// ```json
/// { "username": "admin", "password": "..." }
/// ```
///
/// Responds with `{access_token, token_type, expires_in}`. Unknown users and
/// wrong passwords both produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(request) = payload?;

    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::validation_error(
            "Username and password are required",
            None,
        ));
    }

    let response = state.auth.login(&request.username, &request.password).await?;
    Ok(ApiResponse::success(response))
}
