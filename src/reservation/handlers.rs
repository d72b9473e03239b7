use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::gateway::{state::AppState, types::ApiError};
use crate::user_auth::service::Claims;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReservationRequest {
    pub numbers: Vec<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationResponse {
    pub reservation_id: Uuid,
    pub draw_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// One reservation as listed to its owner
#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationView {
    pub id: Uuid,
    pub draw_id: i64,
    pub numbers: Vec<i32>,
    pub amount_cents: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyReservationsResponse {
    pub reservations: Vec<ReservationView>,
}

/// Reserve numbers in the open draw
///
/// POST /api/reservations
#[utoipa::path(
    post,
    path = "/api/reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 200, description = "Numbers reserved", body = CreateReservationResponse),
        (status = 400, description = "No numbers / no open draw"),
        (status = 409, description = "A requested number is unavailable")
    ),
    security(("bearer_jwt" = [])),
    tag = "Reservations"
)]
pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<Json<CreateReservationResponse>, ApiError> {
    let user_id = claims.user_id().ok_or(ApiError::Unauthorized)?;

    let reservation = state
        .reservations
        .reserve_numbers(user_id, &req.numbers)
        .await?;

    Ok(Json(CreateReservationResponse {
        reservation_id: reservation.id,
        draw_id: reservation.draw_id,
        expires_at: reservation.expires_at,
    }))
}

/// Cancel a reservation and release its numbers
///
/// DELETE /api/reservations/{id}
#[utoipa::path(
    delete,
    path = "/api/reservations/{id}",
    params(("id" = Uuid, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation cancelled"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown reservation"),
        (status = 409, description = "Reservation already paid")
    ),
    security(("bearer_jwt" = [])),
    tag = "Reservations"
)]
pub async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let user_id = claims.user_id().ok_or(ApiError::Unauthorized)?;

    state.reservations.cancel(id, user_id).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "ok": true }))))
}

/// List the caller's reservations, newest first
///
/// GET /api/me/reservations
#[utoipa::path(
    get,
    path = "/api/me/reservations",
    responses(
        (status = 200, description = "Caller's reservations", body = MyReservationsResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_jwt" = [])),
    tag = "Reservations"
)]
pub async fn my_reservations(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MyReservationsResponse>, ApiError> {
    let user_id = claims.user_id().ok_or(ApiError::Unauthorized)?;

    let reservations = state
        .reservations
        .list_for_user(user_id)
        .await?
        .into_iter()
        .map(|r| ReservationView {
            amount_cents: state.reservations.price_cents(r.numbers.len()),
            id: r.id,
            draw_id: r.draw_id,
            numbers: r.numbers,
            status: r.status,
            created_at: r.created_at,
            expires_at: r.expires_at,
        })
        .collect();

    Ok(Json(MyReservationsResponse { reservations }))
}
