//! Draws: rounds of the raffle, each owning the full slot inventory

pub mod handlers;
pub mod service;

pub use service::{Draw, DrawError, DrawService};
