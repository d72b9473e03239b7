//! Reservation lifecycle: claim, expiry sweep, cancellation
//!
//! The consistency-critical part of the service. See `service` for the
//! claim transaction and `state` for the status machines.

pub mod error;
pub mod handlers;
pub mod service;
pub mod state;


pub use error::ReservationError;
pub use service::{Reservation, ReservationService};
pub use state::{ReservationStatus, SlotStatus};
