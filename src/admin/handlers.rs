use axum::{
    Extension, Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::gateway::{state::AppState, types::ApiError};
use crate::user_auth::service::Claims;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListReservationsParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminReservationRow {
    pub id: Uuid,
    pub user_id: i64,
    pub email: String,
    pub draw_id: i64,
    pub numbers: Vec<i32>,
    pub amount_cents: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminReservationsResponse {
    pub reservations: Vec<AdminReservationRow>,
    pub total: i64,
}

/// List reservations across all users (admin only)
///
/// GET /api/admin/reservations
#[utoipa::path(
    get,
    path = "/api/admin/reservations",
    params(ListReservationsParams),
    responses(
        (status = 200, description = "Paginated reservations", body = AdminReservationsResponse),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_jwt" = [])),
    tag = "Admin"
)]
pub async fn list_reservations(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ListReservationsParams>,
) -> Result<Json<AdminReservationsResponse>, ApiError> {
    let user_id = claims.user_id().ok_or(ApiError::Unauthorized)?;
    if !state.user_auth.is_admin(user_id).await? {
        return Err(ApiError::Forbidden);
    }

    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(50).clamp(1, 200);
    let offset = (page - 1) as i64 * page_size as i64;

    let total: i64 = match &params.status {
        Some(status) => {
            sqlx::query_scalar(r#"SELECT count(*) FROM reservations WHERE status = $1"#)
                .bind(status)
                .fetch_one(state.db.pool())
                .await
        }
        None => {
            sqlx::query_scalar(r#"SELECT count(*) FROM reservations"#)
                .fetch_one(state.db.pool())
                .await
        }
    }
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    let rows = match &params.status {
        Some(status) => {
            sqlx::query(
                r#"SELECT r.id, r.user_id, u.email, r.draw_id, r.numbers, r.status,
                          r.created_at, r.expires_at
                     FROM reservations r
                     JOIN users u ON u.id = r.user_id
                    WHERE r.status = $1
                 ORDER BY r.created_at DESC
                    LIMIT $2 OFFSET $3"#,
            )
            .bind(status)
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(state.db.pool())
            .await
        }
        None => {
            sqlx::query(
                r#"SELECT r.id, r.user_id, u.email, r.draw_id, r.numbers, r.status,
                          r.created_at, r.expires_at
                     FROM reservations r
                     JOIN users u ON u.id = r.user_id
                 ORDER BY r.created_at DESC
                    LIMIT $1 OFFSET $2"#,
            )
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(state.db.pool())
            .await
        }
    }
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    let reservations = rows
        .into_iter()
        .map(|r| {
            let numbers: Vec<i32> = r.get("numbers");
            AdminReservationRow {
                id: r.get("id"),
                user_id: r.get("user_id"),
                email: r.get("email"),
                draw_id: r.get("draw_id"),
                amount_cents: state.reservations.price_cents(numbers.len()),
                numbers,
                status: r.get("status"),
                created_at: r.get("created_at"),
                expires_at: r.get("expires_at"),
            }
        })
        .collect();

    Ok(Json(AdminReservationsResponse {
        reservations,
        total,
    }))
}
