use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Reservation not found")]
    ReservationNotFound,

    #[error("Reservation belongs to another user")]
    Forbidden,

    #[error("Reservation has status {0}, cannot be paid")]
    WrongReservationStatus(String),

    #[error("Reservation expired before payment started")]
    ReservationExpired,

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Payment provider not configured")]
    ProviderNotConfigured,
}
