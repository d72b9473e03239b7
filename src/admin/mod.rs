//! Admin-only inspection endpoints

pub mod handlers;
