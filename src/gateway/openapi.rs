//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:4000/docs`
//! - OpenAPI JSON: `http://localhost:4000/api-docs/openapi.json`

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::admin::handlers::{AdminReservationRow, AdminReservationsResponse};
use crate::draw::handlers::{DrawNumbersResponse, NumbersBoardResponse};
use crate::draw::service::{Draw, NumberEntry};
use crate::gateway::handlers::HealthResponse;
use crate::payment::handlers::{
    CreatePixRequest, PaymentStatusResponse, PixChargeResponse, WebhookData, WebhookNotification,
};
use crate::reservation::handlers::{
    CreateReservationRequest, CreateReservationResponse, MyReservationsResponse, ReservationView,
};
use crate::user_auth::handlers::MeResponse;
use crate::user_auth::service::{AuthResponse, LoginRequest, RegisterRequest, UserInfo};

/// Bearer JWT security scheme
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_jwt",
                SecurityScheme::Http(
                    Http::builder()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rifa PIX API",
        version = "0.1.0",
        description = "Raffle number-reservation backend with PIX payments.",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:4000", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health_check,
        crate::user_auth::handlers::register,
        crate::user_auth::handlers::login,
        crate::user_auth::handlers::me,
        crate::reservation::handlers::create_reservation,
        crate::reservation::handlers::cancel_reservation,
        crate::reservation::handlers::my_reservations,
        crate::draw::handlers::numbers_board,
        crate::draw::handlers::current_draw,
        crate::draw::handlers::draw_numbers,
        crate::payment::handlers::create_pix,
        crate::payment::handlers::payment_status,
        crate::payment::handlers::webhook,
        crate::admin::handlers::list_reservations,
    ),
    components(
        schemas(
            HealthResponse,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            UserInfo,
            MeResponse,
            CreateReservationRequest,
            CreateReservationResponse,
            ReservationView,
            MyReservationsResponse,
            NumbersBoardResponse,
            DrawNumbersResponse,
            NumberEntry,
            Draw,
            CreatePixRequest,
            PixChargeResponse,
            PaymentStatusResponse,
            WebhookNotification,
            WebhookData,
            AdminReservationRow,
            AdminReservationsResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Draws", description = "Public draw and numbers-board queries"),
        (name = "Reservations", description = "Number reservations (auth required)"),
        (name = "Payments", description = "PIX charges and payment status"),
        (name = "Admin", description = "Administrative inspection"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Rifa PIX API");
        assert_eq!(spec.info.version, "0.1.0");
    }

    #[test]
    fn test_openapi_json_serializable() {
        let spec = ApiDoc::openapi();
        let json = spec.to_json();
        assert!(json.is_ok());
        assert!(json.unwrap().contains("Rifa PIX API"));
    }

    #[test]
    fn test_core_endpoints_registered() {
        let spec = ApiDoc::openapi();
        let paths = spec.paths;
        assert!(paths.paths.contains_key("/health"));
        assert!(paths.paths.contains_key("/api/reservations"));
        assert!(paths.paths.contains_key("/api/numbers"));
        assert!(paths.paths.contains_key("/api/payments/pix"));
        assert!(paths.paths.contains_key("/api/payments/webhook"));
    }

    #[test]
    fn test_security_scheme_registered() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("should have components");
        assert!(components.security_schemes.contains_key("bearer_jwt"));
    }
}
