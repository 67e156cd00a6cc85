use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Booking, CinemaHallSeat, Coupon, Movie, Notification, Screening};
use crate::{Amount, StorageError};

/// Record access for screenings, seats, bookings and notifications.
///
/// Lookups return `Ok(None)` for unknown ids; `Err` is reserved for
/// backend failures, which callers propagate as-is.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn load_screening(&self, id: Uuid) -> Result<Option<Screening>, StorageError>;

    /// Seats of a hall in layout order. Unknown halls yield an empty list.
    async fn load_seats(&self, hall_id: Uuid) -> Result<Vec<CinemaHallSeat>, StorageError>;

    /// Insert or replace a booking by id.
    async fn save_booking(&self, booking: &Booking) -> Result<(), StorageError>;

    async fn save_notification(&self, notification: &Notification) -> Result<(), StorageError>;

    async fn load_booking(&self, id: Uuid) -> Result<Option<Booking>, StorageError>;

    async fn list_bookings(&self) -> Result<Vec<Booking>, StorageError>;

    async fn list_screenings(&self) -> Result<Vec<Screening>, StorageError>;

    /// Insert or replace a screening by id.
    async fn save_screening(&self, screening: &Screening) -> Result<(), StorageError>;

    async fn list_movies(&self) -> Result<Vec<Movie>, StorageError>;

    /// Insert or replace a movie by id.
    async fn save_movie(&self, movie: &Movie) -> Result<(), StorageError>;

    async fn load_coupon(&self, code: &str) -> Result<Option<Coupon>, StorageError>;

    /// Admin price edit. Returns false when the hall has no such seat.
    async fn set_seat_price(
        &self,
        hall_id: Uuid,
        seat_id: &str,
        price_cents: Amount,
    ) -> Result<bool, StorageError>;
}
