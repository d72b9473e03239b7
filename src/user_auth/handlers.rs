use axum::{Extension, Json, extract::State, http::StatusCode};
use std::sync::Arc;
use validator::Validate;

use super::service::{AuthResponse, Claims, LoginRequest, RegisterRequest, UserInfo};
use crate::gateway::{state::AppState, types::ApiError};

/// Register a new user
///
/// POST /api/auth/register
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Email already in use")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    req.validate().map_err(|_| ApiError::InvalidPayload)?;

    let resp = state.user_auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// Login
///
/// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::InvalidPayload);
    }

    let resp = state.user_auth.login(req).await.map_err(|e| {
        tracing::warn!("login failed: {:?}", e);
        ApiError::from(e)
    })?;
    Ok(Json(resp))
}

#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    pub ok: bool,
    pub user: UserInfo,
}

/// Current authenticated user
///
/// GET /api/auth/me
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Caller identity", body = MeResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_jwt" = [])),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MeResponse>, ApiError> {
    let user_id = claims.user_id().ok_or(ApiError::Unauthorized)?;
    let user = state
        .user_auth
        .get_user(user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(MeResponse { ok: true, user }))
}
