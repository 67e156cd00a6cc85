pub mod models;
pub mod search;
pub mod repository;
pub mod notify;
pub mod payment;

pub use models::{
    Booking, BookingStatus, CinemaHall, CinemaHallSeat, Coupon, Movie, Notification, Screening,
    SEATS_PER_ROW,
};
pub use notify::NotificationSink;
pub use payment::{CardDetails, PaymentAdapter, PaymentReceipt, PaymentStatus};
pub use repository::PersistenceGateway;
pub use search::{MovieFilter, MovieSearch, Role};

/// Amounts are integer cents.
pub type Amount = i64;

/// Failure reported by a persistence backend. Passed through the core unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Seats unavailable: {}", .0.join(", "))]
    SeatUnavailable(Vec<String>),
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type BookingResult<T> = Result<T, BookingError>;
