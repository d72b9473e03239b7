//! Rifa PIX - raffle number-reservation backend
//!
//! Users reserve numbered slots in the open draw and pay for them via PIX;
//! the slot state machine (`available → reserved → sold`) is enforced
//! entirely through PostgreSQL conditional writes.
//!
//! # Modules
//!
//! - [`config`] - YAML application configuration
//! - [`db`] - PostgreSQL connection pool
//! - [`schema`] - Schema bootstrap
//! - [`reservation`] - Reservation lifecycle (claim, sweep, cancel)
//! - [`draw`] - Draw lifecycle and rollover
//! - [`payment`] - PIX provider client and the payment bridge
//! - [`user_auth`] - Registration, login, JWT middleware
//! - [`admin`] - Admin inspection endpoints
//! - [`gateway`] - HTTP router, state, error envelope

pub mod admin;
pub mod config;
pub mod db;
pub mod draw;
pub mod gateway;
pub mod logging;
pub mod payment;
pub mod reservation;
pub mod schema;
pub mod user_auth;

#[cfg(test)]
pub(crate) mod testkit;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use db::Database;
pub use draw::{Draw, DrawService};
pub use payment::{MercadoPagoClient, PaymentService, PixProvider};
pub use reservation::{Reservation, ReservationService, ReservationStatus, SlotStatus};
pub use user_auth::UserAuthService;
