use chrono::{Duration, NaiveTime, Utc};
use cinema_core::{CinemaHall, Movie, PersistenceGateway, Screening, StorageError};
use cinema_store::JsonFileGateway;
use tracing::info;
use uuid::Uuid;

/// Lay out one hall with an evening screening when the store has no halls
/// yet. Returns whether anything was written.
pub async fn ensure_demo_data(gateway: &JsonFileGateway, seat_price_cents: i64) -> Result<bool, StorageError> {
    if !gateway.list_halls().await?.is_empty() {
        return Ok(false);
    }

    let today = Utc::now().date_naive();
    let movie = Movie {
        id: Uuid::new_v4(),
        title: "The Matrix".to_string(),
        language: "English".to_string(),
        genre: "Science Fiction".to_string(),
        country: "USA".to_string(),
        release_date: today - Duration::days(30),
        duration_mins: 136,
        description: "A hacker learns what the world really is.".to_string(),
        is_active: true,
    };
    gateway.add_movie(&movie).await?;

    let hall = CinemaHall::new("Hall 1", 100);
    let seats = hall.layout_seats(seat_price_cents);
    gateway.add_hall(&hall, seats.clone()).await?;

    let start = NaiveTime::from_hms_opt(19, 30, 0).unwrap_or_default();
    let screening = Screening::new(
        movie.id,
        &hall,
        &seats,
        today + Duration::days(1),
        start,
        start + Duration::minutes(i64::from(movie.duration_mins)),
    );
    gateway.save_screening(&screening).await?;

    info!(
        "Seeded {} with {} seats, screening {} on {}",
        hall.name,
        seats.len(),
        screening.id,
        screening.screening_date
    );
    Ok(true)
}
