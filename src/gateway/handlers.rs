use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub ok: bool,
    pub ts: String,
    pub db: bool,
}

/// Health check
///
/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service health", body = HealthResponse)),
    tag = "System"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let db = state.db.health_check().await.is_ok();
    if !db {
        tracing::warn!("health check: db ping failed");
    }

    Json(HealthResponse {
        ok: true,
        ts: chrono::Utc::now().to_rfc3339(),
        db,
    })
}
