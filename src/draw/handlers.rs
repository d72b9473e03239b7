use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::service::{Draw, NumberEntry};
use crate::gateway::{state::AppState, types::ApiError};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NumbersBoardResponse {
    pub draw_id: Option<i64>,
    pub numbers: Vec<NumberEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DrawNumbersResponse {
    pub numbers: Vec<NumberEntry>,
}

/// Numbers board of the open draw
///
/// GET /api/numbers
#[utoipa::path(
    get,
    path = "/api/numbers",
    responses(
        (status = 200, description = "Board of the open draw", body = NumbersBoardResponse)
    ),
    tag = "Draws"
)]
pub async fn numbers_board(
    State(state): State<Arc<AppState>>,
) -> Result<Json<NumbersBoardResponse>, ApiError> {
    let Some(draw) = state.draws.current().await? else {
        return Ok(Json(NumbersBoardResponse {
            draw_id: None,
            numbers: vec![],
        }));
    };

    let numbers = state.draws.numbers(draw.id).await?;
    Ok(Json(NumbersBoardResponse {
        draw_id: Some(draw.id),
        numbers,
    }))
}

/// Current open draw
///
/// GET /api/draws/current
#[utoipa::path(
    get,
    path = "/api/draws/current",
    responses(
        (status = 200, description = "Open draw, or null when none", body = Option<Draw>)
    ),
    tag = "Draws"
)]
pub async fn current_draw(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<Draw>>, ApiError> {
    let draw = state.draws.current().await?;
    Ok(Json(draw))
}

/// Numbers board of a specific draw
///
/// GET /api/draws/{id}/numbers
#[utoipa::path(
    get,
    path = "/api/draws/{id}/numbers",
    params(("id" = i64, Path, description = "Draw id")),
    responses(
        (status = 200, description = "Board of the draw", body = DrawNumbersResponse)
    ),
    tag = "Draws"
)]
pub async fn draw_numbers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DrawNumbersResponse>, ApiError> {
    let numbers = state.draws.numbers(id).await?;
    Ok(Json(DrawNumbersResponse { numbers }))
}
