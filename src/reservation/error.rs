use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReservationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No numbers requested")]
    NoNumbers,

    #[error("Number out of range: {0}")]
    NumberOutOfRange(i32),

    #[error("No open draw")]
    NoOpenDraw,

    #[error("Number unavailable: {0}")]
    NumberUnavailable(i32),

    #[error("Reservation not found")]
    NotFound,

    #[error("Reservation belongs to another user")]
    Forbidden,

    #[error("Reservation already paid")]
    AlreadyPaid,
}
