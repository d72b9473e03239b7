//! Shared gateway types: the API error envelope and its domain mappings.
//!
//! Error bodies are flat JSON objects, `{"error": "<code>"}` plus optional
//! detail fields (`n` for number conflicts, `status` for reservation-status
//! conflicts), so clients can react to the code without parsing prose.

use crate::draw::service::DrawError;
use crate::payment::error::PaymentError;
use crate::reservation::error::ReservationError;
use crate::user_auth::service::AuthError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("no numbers requested")]
    NoNumbers,

    #[error("number out of range: {0}")]
    NumberOutOfRange(i32),

    #[error("no open draw")]
    NoOpenDraw,

    #[error("number unavailable: {0}")]
    Unavailable(i32),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid payload")]
    InvalidPayload,

    #[error("email already in use")]
    EmailInUse,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("reservation has status {0}")]
    ReservationStatus(String),

    #[error("reservation expired")]
    ReservationExpired,

    #[error("reservation already paid")]
    AlreadyPaid,

    #[error("payment not found")]
    PaymentNotFound,

    #[error("payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("payments disabled")]
    PaymentsDisabled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NoNumbers | ApiError::NumberOutOfRange(_) | ApiError::NoOpenDraw => {
                StatusCode::BAD_REQUEST
            }
            ApiError::InvalidPayload => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound | ApiError::PaymentNotFound => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_)
            | ApiError::EmailInUse
            | ApiError::ReservationStatus(_)
            | ApiError::ReservationExpired
            | ApiError::AlreadyPaid => StatusCode::CONFLICT,
            ApiError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::PaymentsDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> serde_json::Value {
        match self {
            ApiError::NoNumbers => serde_json::json!({ "error": "no_numbers" }),
            ApiError::NumberOutOfRange(n) => {
                serde_json::json!({ "error": "number_out_of_range", "n": n })
            }
            ApiError::NoOpenDraw => serde_json::json!({ "error": "no_open_draw" }),
            ApiError::Unavailable(n) => serde_json::json!({ "error": "unavailable", "n": n }),
            ApiError::NotFound => serde_json::json!({ "error": "not_found" }),
            ApiError::Forbidden => serde_json::json!({ "error": "forbidden" }),
            ApiError::Unauthorized => serde_json::json!({ "error": "unauthorized" }),
            ApiError::InvalidPayload => serde_json::json!({ "error": "invalid_payload" }),
            ApiError::EmailInUse => serde_json::json!({ "error": "email_in_use" }),
            ApiError::InvalidCredentials => serde_json::json!({ "error": "invalid_credentials" }),
            ApiError::ReservationStatus(status) => {
                serde_json::json!({ "error": "reservation_status", "status": status })
            }
            ApiError::ReservationExpired => serde_json::json!({ "error": "reservation_expired" }),
            ApiError::AlreadyPaid => serde_json::json!({ "error": "already_paid" }),
            ApiError::PaymentNotFound => serde_json::json!({ "error": "payment_not_found" }),
            ApiError::ProviderUnavailable(_) => {
                serde_json::json!({ "error": "provider_unavailable" })
            }
            ApiError::PaymentsDisabled => serde_json::json!({ "error": "payments_disabled" }),
            ApiError::Internal(_) => serde_json::json!({ "error": "internal" }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(%detail, "internal error surfaced to client");
        }
        (self.status_code(), Json(self.body())).into_response()
    }
}

impl From<ReservationError> for ApiError {
    fn from(e: ReservationError) -> Self {
        match e {
            ReservationError::Database(e) => ApiError::Internal(e.to_string()),
            ReservationError::NoNumbers => ApiError::NoNumbers,
            ReservationError::NumberOutOfRange(n) => ApiError::NumberOutOfRange(n),
            ReservationError::NoOpenDraw => ApiError::NoOpenDraw,
            ReservationError::NumberUnavailable(n) => ApiError::Unavailable(n),
            ReservationError::NotFound => ApiError::NotFound,
            ReservationError::Forbidden => ApiError::Forbidden,
            ReservationError::AlreadyPaid => ApiError::AlreadyPaid,
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Database(e) => ApiError::Internal(e.to_string()),
            PaymentError::ReservationNotFound => ApiError::NotFound,
            PaymentError::Forbidden => ApiError::Forbidden,
            PaymentError::WrongReservationStatus(s) => ApiError::ReservationStatus(s),
            PaymentError::ReservationExpired => ApiError::ReservationExpired,
            PaymentError::PaymentNotFound(_) => ApiError::PaymentNotFound,
            PaymentError::Provider(msg) => ApiError::ProviderUnavailable(msg),
            PaymentError::ProviderNotConfigured => ApiError::PaymentsDisabled,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Database(e) => ApiError::Internal(e.to_string()),
            AuthError::EmailInUse => ApiError::EmailInUse,
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::InvalidToken => ApiError::Unauthorized,
            AuthError::Hashing(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<DrawError> for ApiError {
    fn from(e: DrawError) -> Self {
        match e {
            DrawError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_names_offending_number() {
        let err = ApiError::Unavailable(42);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            err.body(),
            serde_json::json!({ "error": "unavailable", "n": 42 })
        );
    }

    #[test]
    fn test_client_errors_are_4xx() {
        assert_eq!(ApiError::NoNumbers.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NoOpenDraw.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::AlreadyPaid.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_provider_failure_is_not_a_client_error() {
        let err = ApiError::ProviderUnavailable("timeout".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        // The provider detail stays in the logs, not in the body.
        assert_eq!(err.body(), serde_json::json!({ "error": "provider_unavailable" }));
    }

    #[test]
    fn test_domain_error_conversion() {
        let api: ApiError = ReservationError::NumberUnavailable(7).into();
        assert!(matches!(api, ApiError::Unavailable(7)));

        let api: ApiError = PaymentError::WrongReservationStatus("paid".to_string()).into();
        assert!(matches!(api, ApiError::ReservationStatus(s) if s == "paid"));

        let api: ApiError = AuthError::InvalidToken.into();
        assert!(matches!(api, ApiError::Unauthorized));
    }
}
