use std::sync::Arc;

use crate::db::Database;
use crate::draw::service::DrawService;
use crate::payment::service::PaymentService;
use crate::reservation::service::ReservationService;
use crate::user_auth::service::UserAuthService;

/// Shared gateway state
pub struct AppState {
    pub db: Arc<Database>,
    pub reservations: Arc<ReservationService>,
    pub draws: Arc<DrawService>,
    /// None when no provider access token is configured; the payment routes
    /// answer `payments_disabled` instead of panicking at startup.
    pub payments: Option<Arc<PaymentService>>,
    pub user_auth: Arc<UserAuthService>,
    /// Exact CORS origin; None means permissive (development default).
    pub cors_origin: Option<String>,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        reservations: Arc<ReservationService>,
        draws: Arc<DrawService>,
        payments: Option<Arc<PaymentService>>,
        user_auth: Arc<UserAuthService>,
        cors_origin: Option<String>,
    ) -> Self {
        Self {
            db,
            reservations,
            draws,
            payments,
            user_auth,
            cors_origin,
        }
    }
}
