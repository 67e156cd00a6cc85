use chrono::NaiveDate;
use cinema_core::{Amount, BookingError, BookingResult, Coupon, PersistenceGateway, Screening};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// Computes booking totals from the current seat prices.
///
/// Prices are read from the gateway on every call and never cached, so an
/// admin price edit applies to the next booking only. Bookings keep the
/// total they were charged.
pub struct PricingEngine {
    gateway: Arc<dyn PersistenceGateway>,
}

impl PricingEngine {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Sum of the listed seats' prices for a screening.
    pub async fn price_for(&self, screening_id: Uuid, seat_ids: &BTreeSet<String>) -> BookingResult<Amount> {
        let screening = self
            .gateway
            .load_screening(screening_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("screening {}", screening_id)))?;

        self.price_seats(&screening, seat_ids).await
    }

    /// Same as [`price_for`](Self::price_for) for an already loaded screening.
    pub async fn price_seats(&self, screening: &Screening, seat_ids: &BTreeSet<String>) -> BookingResult<Amount> {
        let foreign: Vec<&str> = seat_ids
            .iter()
            .filter(|id| !screening.has_seat(id))
            .map(String::as_str)
            .collect();
        if !foreign.is_empty() {
            return Err(BookingError::InvalidRequest(format!(
                "seats {} are not part of screening {}",
                foreign.join(", "),
                screening.id
            )));
        }

        let prices: HashMap<String, Amount> = self
            .gateway
            .load_seats(screening.hall_id)
            .await?
            .into_iter()
            .map(|seat| (seat.seat_id, seat.price_cents))
            .collect();

        seat_ids.iter().try_fold(0, |total, id| {
            prices
                .get(id)
                .map(|price| total + price)
                .ok_or_else(|| BookingError::NotFound(format!("seat {} in hall {}", id, screening.hall_id)))
        })
    }

    /// Apply a percentage coupon, rounding the discounted total down to the cent.
    pub fn apply_coupon(total: Amount, coupon: &Coupon, today: NaiveDate) -> BookingResult<Amount> {
        if !coupon.is_valid_on(today) {
            return Err(BookingError::InvalidRequest(format!(
                "coupon {} is expired or invalid",
                coupon.code
            )));
        }
        Ok(total * (100 - Amount::from(coupon.discount_percentage)) / 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use cinema_core::{CinemaHall, CinemaHallSeat};
    use cinema_store::MemoryGateway;

    fn seats(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn setup() -> (Arc<MemoryGateway>, Screening) {
        let gateway = Arc::new(MemoryGateway::new());
        let hall = CinemaHall::new("Hall 1", 10);
        let mut hall_seats = hall.layout_seats(1000);
        hall_seats[1].price_cents = 1200;
        hall_seats[2].price_cents = 9900;
        gateway.add_hall(&hall, hall_seats.clone());

        let screening = Screening::new(
            Uuid::new_v4(),
            &hall,
            &hall_seats,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        );
        gateway.add_screening(screening.clone());
        (gateway, screening)
    }

    #[tokio::test]
    async fn test_price_is_sum_of_selected_seats() {
        let (gateway, screening) = setup();
        let engine = PricingEngine::new(gateway);

        let total = engine.price_for(screening.id, &seats(&["1-1", "1-2"])).await.unwrap();
        assert_eq!(total, 1000 + 1200);
    }

    #[tokio::test]
    async fn test_price_reads_current_seat_price() {
        let (gateway, screening) = setup();
        let engine = PricingEngine::new(gateway.clone());

        gateway.set_seat_price(screening.hall_id, "1-1", 1500).await.unwrap();
        let total = engine.price_for(screening.id, &seats(&["1-1"])).await.unwrap();
        assert_eq!(total, 1500);
    }

    #[tokio::test]
    async fn test_unknown_screening_and_foreign_seat() {
        let (gateway, screening) = setup();
        let engine = PricingEngine::new(gateway);

        let err = engine.price_for(Uuid::new_v4(), &seats(&["1-1"])).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));

        let err = engine.price_for(screening.id, &seats(&["7-7"])).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidRequest(_)));
    }

    #[test]
    fn test_coupon_discount() {
        let coupon = Coupon {
            code: "HALF".to_string(),
            discount_percentage: 15,
            expires_on: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        };
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        // 2215 * 0.85 = 1882.75, rounded down
        assert_eq!(PricingEngine::apply_coupon(2215, &coupon, today).unwrap(), 1882);

        let late = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(PricingEngine::apply_coupon(2215, &coupon, late).is_err());
    }

    #[test]
    fn test_seat_id_format() {
        assert_eq!(CinemaHallSeat::id_for(3, 10), "3-10");
    }
}
