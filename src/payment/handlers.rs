use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::gateway::{state::AppState, types::ApiError};
use crate::payment::service::PaymentService;
use crate::user_auth::service::Claims;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePixRequest {
    pub reservation_id: Uuid,
}

/// Charge fields the frontend renders the QR from
#[derive(Debug, Serialize, ToSchema)]
pub struct PixChargeResponse {
    pub id: String,
    pub status: String,
    pub qr_code: Option<String>,
    pub qr_code_base64: Option<String>,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub payment_id: String,
    pub status: String,
    pub status_detail: Option<String>,
}

/// Provider webhook notification. Only the payment id is trusted; the
/// current status is always re-fetched from the provider.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookNotification {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookData {
    pub id: serde_json::Value,
}

fn payments(state: &AppState) -> Result<&Arc<PaymentService>, ApiError> {
    state.payments.as_ref().ok_or(ApiError::PaymentsDisabled)
}

/// Create a PIX charge for a reservation
///
/// POST /api/payments/pix
#[utoipa::path(
    post,
    path = "/api/payments/pix",
    request_body = CreatePixRequest,
    responses(
        (status = 200, description = "Charge created", body = PixChargeResponse),
        (status = 403, description = "Not the reservation owner"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation not payable"),
        (status = 502, description = "Provider unavailable")
    ),
    security(("bearer_jwt" = [])),
    tag = "Payments"
)]
pub async fn create_pix(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePixRequest>,
) -> Result<Json<PixChargeResponse>, ApiError> {
    let user_id = claims.user_id().ok_or(ApiError::Unauthorized)?;

    let charge = payments(&state)?
        .create_pix_charge(user_id, req.reservation_id)
        .await?;

    Ok(Json(PixChargeResponse {
        id: charge.payment_id,
        status: charge.status,
        qr_code: charge.qr_code,
        qr_code_base64: charge.qr_code_base64,
        expires_in: charge.expires_in,
    }))
}

/// Poll a payment's status and apply the resulting transition
///
/// GET /api/payments/{id}/status
#[utoipa::path(
    get,
    path = "/api/payments/{id}/status",
    params(("id" = String, Path, description = "Provider payment id")),
    responses(
        (status = 200, description = "Current provider status", body = PaymentStatusResponse),
        (status = 404, description = "Unknown payment"),
        (status = 502, description = "Provider unavailable")
    ),
    security(("bearer_jwt" = [])),
    tag = "Payments"
)]
pub async fn payment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let charge = payments(&state)?.refresh_status(&id).await?;

    Ok(Json(PaymentStatusResponse {
        payment_id: charge.payment_id,
        status: charge.status,
        status_detail: charge.status_detail,
    }))
}

/// Provider webhook
///
/// POST /api/payments/webhook
///
/// Always answers 200: a non-2xx here triggers provider-side redelivery
/// storms, and the transition is idempotent anyway — the next status poll
/// re-derives whatever a lost webhook would have done.
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body = WebhookNotification,
    responses((status = 200, description = "Acknowledged")),
    tag = "Payments"
)]
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Json<serde_json::Value> {
    // Lenient parse: a body this handler cannot read still gets its 200.
    let payment_id = serde_json::from_slice::<WebhookNotification>(&body)
        .ok()
        .and_then(|n| n.data)
        .map(|d| match d.id {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

    match (state.payments.as_ref(), payment_id) {
        (Some(payments), Some(id)) if !id.is_empty() => {
            if let Err(e) = payments.refresh_status(&id).await {
                tracing::warn!(payment_id = %id, "webhook processing failed: {}", e);
            }
        }
        _ => {
            tracing::warn!("ignoring malformed webhook notification");
        }
    }

    Json(serde_json::json!({ "ok": true }))
}
