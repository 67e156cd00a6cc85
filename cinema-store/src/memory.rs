use async_trait::async_trait;
use cinema_core::{
    Amount, Booking, CinemaHall, CinemaHallSeat, Coupon, Movie, Notification, PersistenceGateway,
    Screening, StorageError,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    seats: HashMap<Uuid, Vec<CinemaHallSeat>>,
    screenings: HashMap<Uuid, Screening>,
    bookings: HashMap<Uuid, Booking>,
    notifications: Vec<Notification>,
    movies: Vec<Movie>,
    coupons: HashMap<String, Coupon>,
}

/// In-process gateway for tests and demos.
///
/// `fail_writes(true)` makes every save fail with a backend error, which is
/// how storage failure paths are exercised.
#[derive(Default)]
pub struct MemoryGateway {
    state: RwLock<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_hall(&self, hall: &CinemaHall, seats: Vec<CinemaHallSeat>) {
        self.state.write().seats.insert(hall.id, seats);
    }

    pub fn add_screening(&self, screening: Screening) {
        self.state.write().screenings.insert(screening.id, screening);
    }

    pub fn add_movie(&self, movie: Movie) {
        self.state.write().movies.push(movie);
    }

    pub fn add_coupon(&self, coupon: Coupon) {
        self.state.write().coupons.insert(coupon.code.clone(), coupon);
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.read().notifications.clone()
    }

    pub fn booking_count(&self) -> usize {
        self.state.read().bookings.len()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("memory store is read-only".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn load_screening(&self, id: Uuid) -> Result<Option<Screening>, StorageError> {
        Ok(self.state.read().screenings.get(&id).cloned())
    }

    async fn load_seats(&self, hall_id: Uuid) -> Result<Vec<CinemaHallSeat>, StorageError> {
        Ok(self.state.read().seats.get(&hall_id).cloned().unwrap_or_default())
    }

    async fn save_booking(&self, booking: &Booking) -> Result<(), StorageError> {
        self.check_writable()?;
        self.state.write().bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn save_notification(&self, notification: &Notification) -> Result<(), StorageError> {
        self.check_writable()?;
        self.state.write().notifications.push(notification.clone());
        Ok(())
    }

    async fn load_booking(&self, id: Uuid) -> Result<Option<Booking>, StorageError> {
        Ok(self.state.read().bookings.get(&id).cloned())
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StorageError> {
        let mut bookings: Vec<Booking> = self.state.read().bookings.values().cloned().collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn list_screenings(&self) -> Result<Vec<Screening>, StorageError> {
        Ok(self.state.read().screenings.values().cloned().collect())
    }

    async fn save_screening(&self, screening: &Screening) -> Result<(), StorageError> {
        self.check_writable()?;
        self.state.write().screenings.insert(screening.id, screening.clone());
        Ok(())
    }

    async fn list_movies(&self) -> Result<Vec<Movie>, StorageError> {
        Ok(self.state.read().movies.clone())
    }

    async fn save_movie(&self, movie: &Movie) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut state = self.state.write();
        match state.movies.iter_mut().find(|m| m.id == movie.id) {
            Some(existing) => *existing = movie.clone(),
            None => state.movies.push(movie.clone()),
        }
        Ok(())
    }

    async fn load_coupon(&self, code: &str) -> Result<Option<Coupon>, StorageError> {
        Ok(self.state.read().coupons.get(code).cloned())
    }

    async fn set_seat_price(
        &self,
        hall_id: Uuid,
        seat_id: &str,
        price_cents: Amount,
    ) -> Result<bool, StorageError> {
        self.check_writable()?;
        let mut state = self.state.write();
        let seat = state
            .seats
            .get_mut(&hall_id)
            .and_then(|seats| seats.iter_mut().find(|s| s.seat_id == seat_id));
        match seat {
            Some(seat) => {
                seat.price_cents = price_cents;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_failed_writes_leave_state_untouched() {
        let gateway = MemoryGateway::new();
        let booking = Booking::new(Uuid::new_v4(), "cust".to_string(), BTreeSet::new(), 0);

        gateway.fail_writes(true);
        assert!(matches!(
            gateway.save_booking(&booking).await,
            Err(StorageError::Backend(_))
        ));
        assert_eq!(gateway.booking_count(), 0);

        gateway.fail_writes(false);
        gateway.save_booking(&booking).await.unwrap();
        assert_eq!(gateway.load_booking(booking.id).await.unwrap(), Some(booking));
    }

    #[tokio::test]
    async fn test_save_movie_replaces_by_id() {
        let gateway = MemoryGateway::new();
        let mut movie = Movie {
            id: Uuid::new_v4(),
            title: "Aftersun".to_string(),
            language: "English".to_string(),
            genre: "Drama".to_string(),
            country: "UK".to_string(),
            release_date: chrono::NaiveDate::from_ymd_opt(2022, 11, 18).unwrap(),
            duration_mins: 101,
            description: String::new(),
            is_active: true,
        };
        gateway.add_movie(movie.clone());

        movie.deactivate();
        gateway.save_movie(&movie).await.unwrap();
        assert_eq!(gateway.list_movies().await.unwrap(), vec![movie.clone()]);

        gateway.fail_writes(true);
        movie.is_active = true;
        assert!(gateway.save_movie(&movie).await.is_err());
        assert!(!gateway.list_movies().await.unwrap()[0].is_active);
    }

    #[tokio::test]
    async fn test_set_seat_price() {
        let gateway = MemoryGateway::new();
        let hall = CinemaHall::new("Hall 2", 10);
        gateway.add_hall(&hall, hall.layout_seats(1000));

        assert!(gateway.set_seat_price(hall.id, "1-3", 1400).await.unwrap());
        assert!(!gateway.set_seat_price(hall.id, "4-4", 1400).await.unwrap());

        let seats = gateway.load_seats(hall.id).await.unwrap();
        assert_eq!(seats[2].price_cents, 1400);
        assert!(gateway.load_seats(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
