use async_trait::async_trait;
use cinema_core::{
    Amount, Booking, CinemaHall, CinemaHallSeat, Coupon, Movie, Notification, PersistenceGateway,
    Screening, StorageError,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

const MOVIES_FILE: &str = "movies.json";
const HALLS_FILE: &str = "cinema_halls.json";
const SCREENINGS_FILE: &str = "screenings.json";
const BOOKINGS_FILE: &str = "bookings.json";
const NOTIFICATIONS_FILE: &str = "notifications.json";
const COUPONS_FILE: &str = "coupons.json";

/// Hall record as stored on disk, seats inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HallRecord {
    pub hall: CinemaHall,
    pub seats: Vec<CinemaHallSeat>,
}

/// Gateway over a directory of JSON array files, one per record kind.
///
/// Every write is read-modify-write of a whole file, serialized by one
/// async mutex and committed by renaming a temp file over the original.
/// A missing file reads as an empty list.
pub struct JsonFileGateway {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileGateway {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&data_dir).await?;
        info!("JSON store opened at {}", data_dir.display());
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub async fn add_hall(&self, hall: &CinemaHall, seats: Vec<CinemaHallSeat>) -> Result<(), StorageError> {
        let record = HallRecord {
            hall: hall.clone(),
            seats,
        };
        self.upsert(HALLS_FILE, record, |r| r.hall.id == hall.id).await
    }

    pub async fn list_halls(&self) -> Result<Vec<HallRecord>, StorageError> {
        self.read_all(HALLS_FILE).await
    }

    pub async fn add_movie(&self, movie: &Movie) -> Result<(), StorageError> {
        self.save_movie(movie).await
    }

    pub async fn add_coupon(&self, coupon: &Coupon) -> Result<(), StorageError> {
        self.upsert(COUPONS_FILE, coupon.clone(), |c| c.code == coupon.code).await
    }

    pub async fn list_notifications(&self) -> Result<Vec<Notification>, StorageError> {
        self.read_all(NOTIFICATIONS_FILE).await
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    async fn read_all<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, StorageError> {
        let path = self.path(file);
        match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not found, treating as empty", path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all<T: Serialize>(&self, file: &str, records: &[T]) -> Result<(), StorageError> {
        let path = self.path(file);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Replace the first record matching `same`, or append.
    async fn upsert<T, F>(&self, file: &str, record: T, same: F) -> Result<(), StorageError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut records: Vec<T> = self.read_all(file).await?;
        match records.iter_mut().find(|r| same(r)) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.write_all(file, &records).await
    }
}

#[async_trait]
impl PersistenceGateway for JsonFileGateway {
    async fn load_screening(&self, id: Uuid) -> Result<Option<Screening>, StorageError> {
        let screenings: Vec<Screening> = self.read_all(SCREENINGS_FILE).await?;
        Ok(screenings.into_iter().find(|s| s.id == id))
    }

    async fn load_seats(&self, hall_id: Uuid) -> Result<Vec<CinemaHallSeat>, StorageError> {
        let halls: Vec<HallRecord> = self.read_all(HALLS_FILE).await?;
        Ok(halls
            .into_iter()
            .find(|r| r.hall.id == hall_id)
            .map(|r| r.seats)
            .unwrap_or_default())
    }

    async fn save_booking(&self, booking: &Booking) -> Result<(), StorageError> {
        self.upsert(BOOKINGS_FILE, booking.clone(), |b| b.id == booking.id).await
    }

    async fn save_notification(&self, notification: &Notification) -> Result<(), StorageError> {
        self.upsert(NOTIFICATIONS_FILE, notification.clone(), |n| n.id == notification.id)
            .await
    }

    async fn load_booking(&self, id: Uuid) -> Result<Option<Booking>, StorageError> {
        let bookings: Vec<Booking> = self.read_all(BOOKINGS_FILE).await?;
        Ok(bookings.into_iter().find(|b| b.id == id))
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StorageError> {
        self.read_all(BOOKINGS_FILE).await
    }

    async fn list_screenings(&self) -> Result<Vec<Screening>, StorageError> {
        self.read_all(SCREENINGS_FILE).await
    }

    async fn save_screening(&self, screening: &Screening) -> Result<(), StorageError> {
        self.upsert(SCREENINGS_FILE, screening.clone(), |s| s.id == screening.id)
            .await
    }

    async fn list_movies(&self) -> Result<Vec<Movie>, StorageError> {
        self.read_all(MOVIES_FILE).await
    }

    async fn save_movie(&self, movie: &Movie) -> Result<(), StorageError> {
        self.upsert(MOVIES_FILE, movie.clone(), |m| m.id == movie.id).await
    }

    async fn load_coupon(&self, code: &str) -> Result<Option<Coupon>, StorageError> {
        let coupons: Vec<Coupon> = self.read_all(COUPONS_FILE).await?;
        Ok(coupons.into_iter().find(|c| c.code == code))
    }

    async fn set_seat_price(
        &self,
        hall_id: Uuid,
        seat_id: &str,
        price_cents: Amount,
    ) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut halls: Vec<HallRecord> = self.read_all(HALLS_FILE).await?;
        let seat = halls
            .iter_mut()
            .find(|r| r.hall.id == hall_id)
            .and_then(|r| r.seats.iter_mut().find(|s| s.seat_id == seat_id));
        let Some(seat) = seat else {
            return Ok(false);
        };
        seat.price_cents = price_cents;
        self.write_all(HALLS_FILE, &halls).await?;
        Ok(true)
    }
}
