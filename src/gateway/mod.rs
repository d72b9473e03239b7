pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::user_auth::middleware::jwt_auth_middleware;
use state::AppState;

/// Build the full application router.
pub fn create_app(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(crate::user_auth::handlers::register))
        .route("/login", post(crate::user_auth::handlers::login));

    let auth_me = Router::new()
        .route("/me", get(crate::user_auth::handlers::me))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    // Public board queries: no auth, display-only reads.
    let public_routes = Router::new()
        .route("/numbers", get(crate::draw::handlers::numbers_board))
        .route("/draws/current", get(crate::draw::handlers::current_draw))
        .route(
            "/draws/{id}/numbers",
            get(crate::draw::handlers::draw_numbers),
        );

    let reservation_routes = Router::new()
        .route(
            "/reservations",
            post(crate::reservation::handlers::create_reservation),
        )
        .route(
            "/reservations/{id}",
            delete(crate::reservation::handlers::cancel_reservation),
        )
        .route(
            "/me/reservations",
            get(crate::reservation::handlers::my_reservations),
        )
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let payment_routes = Router::new()
        .route("/payments/pix", post(crate::payment::handlers::create_pix))
        .route(
            "/payments/{id}/status",
            get(crate::payment::handlers::payment_status),
        )
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
        // The provider pushes here unauthenticated; the handler never trusts
        // the body beyond the payment id.
        .route("/payments/webhook", post(crate::payment::handlers::webhook));

    let admin_routes = Router::new()
        .route(
            "/reservations",
            get(crate::admin::handlers::list_reservations),
        )
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let cors = match state
        .cors_origin
        .as_deref()
        .and_then(|origin| HeaderValue::from_str(origin).ok())
    {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::permissive(),
    };

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/auth", auth_routes.merge(auth_me))
        .nest("/api", public_routes)
        .nest("/api", reservation_routes)
        .nest("/api", payment_routes)
        .nest("/api/admin", admin_routes)
        .layer(cors)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Start the HTTP gateway server
pub async fn run_server(state: Arc<AppState>, host: &str, port: u16) {
    let app = create_app(state);

    let addr = format!("{}:{}", host, port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("FATAL: Failed to bind to {}: {}", addr, e);
            eprintln!("Hint: port {} may already be in use", port);
            std::process::exit(1);
        }
    };

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("API docs at http://{}/docs", addr);

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("FATAL: Server error: {}", e);
        std::process::exit(1);
    }
}
