use crate::models::{BookingRequest, RestoreSummary};
use crate::notices::Notice;
use crate::orchestrator::PaymentOrchestrator;
use cinema_catalog::{Availability, PricingEngine, SeatLedger, SeatStatus};
use cinema_core::{
    Amount, Booking, BookingError, BookingResult, BookingStatus, Coupon, Movie, MovieFilter,
    NotificationSink, PersistenceGateway, Role, Screening,
};
use cinema_shared::models::events::SeatsChangedEvent;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const DEFAULT_HOLD_TTL: Duration = Duration::from_secs(15 * 60);

/// Owns the booking lifecycle: validation, seat holds, pricing, payment,
/// persistence and customer notices.
///
/// The ledger is the only authority on seat ownership. Every failure after a
/// successful hold releases the held seats before the error is returned.
pub struct BookingManager {
    gateway: Arc<dyn PersistenceGateway>,
    sink: Arc<dyn NotificationSink>,
    ledger: Arc<SeatLedger>,
    pricing: PricingEngine,
    payments: Option<PaymentOrchestrator>,
    registry: Mutex<Registry>,
    seat_feed: Option<broadcast::Sender<SeatsChangedEvent>>,
    hold_ttl: Duration,
}

#[derive(Default)]
struct Registry {
    bookings: HashMap<Uuid, Booking>,
    /// Bookings with a refund in flight. No other cancellation may start.
    refunding: HashSet<Uuid>,
}

#[derive(Debug, Clone, Copy)]
enum CancelKind {
    Customer,
    Refund,
}

impl BookingManager {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            pricing: PricingEngine::new(gateway.clone()),
            gateway,
            sink,
            ledger: Arc::new(SeatLedger::new()),
            payments: None,
            registry: Mutex::new(Registry::default()),
            seat_feed: None,
            hold_ttl: DEFAULT_HOLD_TTL,
        }
    }

    pub fn with_payments(mut self, payments: PaymentOrchestrator) -> Self {
        self.payments = Some(payments);
        self
    }

    /// Publish a `SeatsChangedEvent` whenever seats are booked or freed.
    pub fn with_seat_feed(mut self, tx: broadcast::Sender<SeatsChangedEvent>) -> Self {
        self.seat_feed = Some(tx);
        self
    }

    pub fn with_hold_ttl(mut self, ttl: Duration) -> Self {
        self.hold_ttl = ttl;
        self
    }

    pub fn ledger(&self) -> &SeatLedger {
        &self.ledger
    }

    pub async fn create_booking<I, S>(
        &self,
        screening_id: Uuid,
        customer_id: impl Into<String>,
        seat_ids: I,
    ) -> BookingResult<Booking>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create_booking_with(BookingRequest::new(screening_id, customer_id, seat_ids))
            .await
    }

    pub async fn create_booking_with(&self, request: BookingRequest) -> BookingResult<Booking> {
        if request.seat_ids.is_empty() {
            return Err(BookingError::InvalidRequest("no seats requested".to_string()));
        }

        let today = chrono::Utc::now().date_naive();
        if let Some(card) = request.card.as_ref() {
            card.validate(today)?;
        }

        let screening = self.load_screening(request.screening_id).await?;
        if !screening.is_active {
            return Err(BookingError::InvalidRequest(format!(
                "screening {} is no longer active",
                screening.id
            )));
        }

        let foreign: Vec<&str> = request
            .seat_ids
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

        let coupon = match request.coupon_code.as_deref() {
            Some(code) => {
                let coupon = self
                    .gateway
                    .load_coupon(code)
                    .await?
                    .ok_or_else(|| BookingError::InvalidRequest(format!("unknown coupon {}", code)))?;
                if !coupon.is_valid_on(today) {
                    return Err(BookingError::InvalidRequest(format!("coupon {} has expired", code)));
                }
                Some(coupon)
            }
            None => None,
        };

        // Holds are taken in the name of the booking id
        let booking_id = Uuid::new_v4();
        self.register(&screening);
        self.ledger.try_hold(screening.id, booking_id, &request.seat_ids)?;
        debug!("Held {:?} of screening {} for {}", request.seat_ids, screening.id, booking_id);

        let priced = self
            .price_booking(booking_id, &screening, &request, coupon.as_ref(), today)
            .await;
        let mut booking = match priced {
            Ok(booking) => booking,
            Err(e) => {
                self.release_quietly(screening.id, booking_id, &request.seat_ids);
                return Err(e);
            }
        };

        let mut charged = false;
        if let (Some(card), Some(payments)) = (request.card.as_ref(), self.payments.as_ref()) {
            match payments.charge(&booking, card).await {
                Ok(receipt) => {
                    booking.payment_reference = Some(receipt.reference);
                    charged = true;
                }
                Err(e) => {
                    self.release_quietly(screening.id, booking_id, &request.seat_ids);
                    booking.cancel()?;
                    if let Err(save_err) = self.gateway.save_booking(&booking).await {
                        error!("Failed to record declined booking {}: {}", booking.id, save_err);
                    }
                    self.registry.lock().bookings.insert(booking.id, booking);
                    return Err(e);
                }
            }
        }

        if let Err(e) = booking.confirm() {
            self.release_quietly(screening.id, booking_id, &request.seat_ids);
            return Err(e);
        }
        if let Err(e) = self.ledger.confirm(screening.id, booking_id, &request.seat_ids) {
            // Some holds expired; give back whatever is still ours
            error!("Hold lost while confirming booking {}: {}", booking.id, e);
            self.release_quietly(screening.id, booking_id, &request.seat_ids);
            if charged {
                self.refund_quietly(&booking).await;
            }
            return Err(e.into());
        }

        if let Err(e) = self.gateway.save_booking(&booking).await {
            error!("Failed to persist booking {}: {}", booking.id, e);
            self.release_quietly(screening.id, booking_id, &request.seat_ids);
            if charged {
                self.refund_quietly(&booking).await;
            }
            return Err(e.into());
        }

        self.registry.lock().bookings.insert(booking.id, booking.clone());
        info!(
            "Booking {} confirmed for {}: {} seats, {} cents",
            booking.id,
            booking.customer_id,
            booking.seat_ids.len(),
            booking.total_cents
        );

        self.publish_seats(&booking, true);
        self.send_notice(Notice::BookingConfirmed, &booking).await;
        Ok(booking)
    }

    /// Customer cancellation. The seats go back to Free.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> BookingResult<Booking> {
        self.cancel_inner(booking_id, CancelKind::Customer).await
    }

    /// Admin cancellation that also refunds the charge, if there was one.
    pub async fn refund_booking(&self, booking_id: Uuid) -> BookingResult<Booking> {
        self.cancel_inner(booking_id, CancelKind::Refund).await
    }

    async fn cancel_inner(&self, booking_id: Uuid, kind: CancelKind) -> BookingResult<Booking> {
        let booking = self.begin_cancel(booking_id, kind)?;

        // Money goes back before anything else changes
        if let CancelKind::Refund = kind {
            if let Err(e) = self.refund_payment(&booking).await {
                self.registry.lock().refunding.remove(&booking_id);
                warn!("Refund of booking {} failed, booking left as is: {}", booking_id, e);
                return Err(e);
            }
        }

        let (previous, cancelled) = {
            let mut registry = self.registry.lock();
            registry.refunding.remove(&booking_id);
            let booking = registry
                .bookings
                .get_mut(&booking_id)
                .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))?;
            let previous = booking.clone();
            booking.cancel()?;
            (previous, booking.clone())
        };

        if let Err(e) = self.gateway.save_booking(&cancelled).await {
            if let CancelKind::Refund = kind {
                error!("Booking {} was refunded but its cancellation was not stored: {}", booking_id, e);
            } else {
                error!("Failed to persist cancellation of {}: {}", booking_id, e);
            }
            self.registry.lock().bookings.insert(booking_id, previous);
            return Err(e.into());
        }

        self.release_quietly(cancelled.screening_id, cancelled.id, &cancelled.seat_ids);

        info!("Booking {} cancelled ({:?})", booking_id, kind);
        self.publish_seats(&cancelled, false);
        let notice = match kind {
            CancelKind::Customer => Notice::BookingCancelled,
            CancelKind::Refund => Notice::BookingRefunded,
        };
        self.send_notice(notice, &cancelled).await;
        Ok(cancelled)
    }

    /// Check that a cancellation may start. A refund also marks the booking
    /// so nothing else cancels it while the payment call is out.
    fn begin_cancel(&self, booking_id: Uuid, kind: CancelKind) -> BookingResult<Booking> {
        let mut registry = self.registry.lock();
        if registry.refunding.contains(&booking_id) {
            return Err(BookingError::InvalidTransition {
                from: "REFUND_PENDING".to_string(),
                to: BookingStatus::Cancelled.as_str().to_string(),
            });
        }

        let booking = registry
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))?;
        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(BookingError::InvalidTransition {
                from: booking.status.as_str().to_string(),
                to: BookingStatus::Cancelled.as_str().to_string(),
            });
        }

        if let CancelKind::Refund = kind {
            registry.refunding.insert(booking_id);
        }
        Ok(booking)
    }

    async fn refund_payment(&self, booking: &Booking) -> BookingResult<()> {
        if booking.payment_reference.is_none() {
            return Ok(());
        }
        let payments = self.payments.as_ref().ok_or_else(|| {
            BookingError::InvalidRequest(format!(
                "booking {} was paid but no payment adapter is configured",
                booking.id
            ))
        })?;
        payments.refund(booking).await?;
        Ok(())
    }

    pub fn get_booking(&self, booking_id: Uuid) -> BookingResult<Booking> {
        self.registry
            .lock()
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))
    }

    /// Oldest first.
    pub fn bookings_for_customer(&self, customer_id: &str) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .registry
            .lock()
            .bookings
            .values()
            .filter(|b| b.customer_id == customer_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        bookings
    }

    pub async fn status_of(&self, screening_id: Uuid, seat_id: &str) -> BookingResult<SeatStatus> {
        self.ensure_registered(screening_id).await?;
        Ok(self.ledger.status_of(screening_id, seat_id)?)
    }

    pub async fn availability(&self, screening_id: Uuid) -> BookingResult<Availability> {
        self.ensure_registered(screening_id).await?;
        Ok(self.ledger.availability(screening_id)?)
    }

    pub async fn price_for(&self, screening_id: Uuid, seat_ids: &BTreeSet<String>) -> BookingResult<Amount> {
        self.pricing.price_for(screening_id, seat_ids).await
    }

    /// Rebuild the registry and the ledger from storage.
    ///
    /// Confirmed bookings take their seats back. Pending bookings were left
    /// behind by a crash mid-booking and are cancelled.
    pub async fn restore(&self) -> BookingResult<RestoreSummary> {
        let mut summary = RestoreSummary::default();

        for screening in self.gateway.list_screenings().await? {
            self.register(&screening);
            summary.screenings += 1;
        }

        let mut stored = self.gateway.list_bookings().await?;
        stored.sort_by_key(|b| b.created_at);

        for mut booking in stored {
            summary.bookings += 1;
            match booking.status {
                BookingStatus::Pending => {
                    booking.cancel()?;
                    self.gateway.save_booking(&booking).await?;
                    warn!("Cancelled abandoned booking {}", booking.id);
                    summary.abandoned += 1;
                }
                BookingStatus::Confirmed => {
                    summary.active_bookings += 1;
                    if let Err(e) = self.ledger.mark_booked(booking.screening_id, booking.id, &booking.seat_ids) {
                        warn!("Booking {} could not reclaim its seats: {}", booking.id, e);
                        summary.conflicts += 1;
                    }
                }
                BookingStatus::Cancelled => {}
            }
            self.registry.lock().bookings.insert(booking.id, booking);
        }

        info!(
            "Restored {} bookings ({} active) across {} screenings",
            summary.bookings, summary.active_bookings, summary.screenings
        );
        Ok(summary)
    }

    /// Take a screening off sale. Refused while any of its seats is held or
    /// booked; refund those bookings first. The ledger stops taking holds
    /// for it in the same step as the check.
    pub async fn deactivate_screening(&self, screening_id: Uuid) -> BookingResult<Screening> {
        let mut screening = self.load_screening(screening_id).await?;
        if !screening.is_active {
            return Err(BookingError::InvalidTransition {
                from: "INACTIVE".to_string(),
                to: "INACTIVE".to_string(),
            });
        }

        self.register(&screening);
        self.ledger.try_close(screening_id)?;

        screening.is_active = false;
        if let Err(e) = self.gateway.save_screening(&screening).await {
            error!("Failed to persist deactivation of screening {}: {}", screening_id, e);
            self.ledger.reopen(screening_id)?;
            return Err(e.into());
        }
        info!("Screening {} deactivated", screening_id);
        Ok(screening)
    }

    /// Take a movie off the listings. Refused while it still has active
    /// screenings.
    pub async fn deactivate_movie(&self, movie_id: Uuid) -> BookingResult<Movie> {
        let mut movie = self
            .gateway
            .list_movies()
            .await?
            .into_iter()
            .find(|m| m.id == movie_id)
            .ok_or_else(|| BookingError::NotFound(format!("movie {}", movie_id)))?;
        if !movie.is_active {
            return Err(BookingError::InvalidTransition {
                from: "INACTIVE".to_string(),
                to: "INACTIVE".to_string(),
            });
        }

        let showing = self
            .gateway
            .list_screenings()
            .await?
            .iter()
            .filter(|s| s.movie_id == movie_id && s.is_active)
            .count();
        if showing > 0 {
            return Err(BookingError::InvalidTransition {
                from: format!("ACTIVE with {} active screenings", showing),
                to: "INACTIVE".to_string(),
            });
        }

        movie.deactivate();
        self.gateway.save_movie(&movie).await?;
        info!("Movie {} ({}) deactivated", movie.title, movie_id);
        Ok(movie)
    }

    /// Movies matching `filter` as seen by `role`.
    pub async fn search_movies(&self, role: Role, filter: &MovieFilter) -> BookingResult<Vec<Movie>> {
        let movies = self.gateway.list_movies().await?;
        Ok(filter.apply(&role, &movies).into_iter().cloned().collect())
    }

    /// Release holds older than the hold TTL. Returns how many seats were freed.
    pub fn sweep_expired_holds(&self) -> usize {
        let expired = self.ledger.expire_holds(self.hold_ttl);
        if !expired.is_empty() {
            info!("Released {} expired seat holds", expired.len());
        }
        expired.len()
    }

    async fn load_screening(&self, screening_id: Uuid) -> BookingResult<Screening> {
        self.gateway
            .load_screening(screening_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("screening {}", screening_id)))
    }

    fn register(&self, screening: &Screening) {
        if self.ledger.is_registered(&screening.id) {
            return;
        }
        self.ledger
            .register_screening(screening.id, screening.seat_ids.iter().cloned());
        if !screening.is_active {
            if let Err(e) = self.ledger.try_close(screening.id) {
                warn!("Inactive screening {} could not be closed: {}", screening.id, e);
            }
        }
    }

    async fn ensure_registered(&self, screening_id: Uuid) -> BookingResult<()> {
        if !self.ledger.is_registered(&screening_id) {
            let screening = self.load_screening(screening_id).await?;
            self.register(&screening);
        }
        Ok(())
    }

    async fn price_booking(
        &self,
        booking_id: Uuid,
        screening: &Screening,
        request: &BookingRequest,
        coupon: Option<&Coupon>,
        today: chrono::NaiveDate,
    ) -> BookingResult<Booking> {
        let mut total = self.pricing.price_seats(screening, &request.seat_ids).await?;
        if let Some(coupon) = coupon {
            total = PricingEngine::apply_coupon(total, coupon, today)?;
        }

        let mut booking = Booking::new(
            screening.id,
            request.customer_id.clone(),
            request.seat_ids.clone(),
            total,
        );
        booking.id = booking_id;
        booking.coupon_code = coupon.map(|c| c.code.clone());
        Ok(booking)
    }

    fn release_quietly(&self, screening_id: Uuid, owner: Uuid, seat_ids: &BTreeSet<String>) {
        if let Err(e) = self.ledger.release(screening_id, owner, seat_ids) {
            error!("Failed to release seats of screening {}: {}", screening_id, e);
        }
    }

    async fn refund_quietly(&self, booking: &Booking) {
        if let Some(payments) = self.payments.as_ref() {
            if let Err(e) = payments.refund(booking).await {
                error!("Refund of booking {} failed: {}", booking.id, e);
            }
        }
    }

    fn publish_seats(&self, booking: &Booking, booked: bool) {
        if let Some(tx) = &self.seat_feed {
            let event = SeatsChangedEvent {
                screening_id: booking.screening_id,
                seat_ids: booking.seat_ids.iter().cloned().collect(),
                booked,
                timestamp: chrono::Utc::now().timestamp(),
            };
            // No receivers is fine
            let _ = tx.send(event);
        }
    }

    async fn send_notice(&self, notice: Notice, booking: &Booking) {
        let notification = notice.for_booking(booking);
        if let Err(e) = self.gateway.save_notification(&notification).await {
            warn!("Failed to store notification {}: {}", notification.id, e);
        }
        self.sink.notify(notification).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use cinema_core::{CinemaHall, Coupon};
    use cinema_store::{MemoryGateway, TracingSink};

    fn setup() -> (Arc<MemoryGateway>, BookingManager, Screening) {
        let gateway = Arc::new(MemoryGateway::new());
        let hall = CinemaHall::new("Hall 1", 20);
        let seats = hall.layout_seats(1000);
        gateway.add_hall(&hall, seats.clone());

        let screening = Screening::new(
            Uuid::new_v4(),
            &hall,
            &seats,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        );
        gateway.add_screening(screening.clone());

        let manager = BookingManager::new(gateway.clone(), Arc::new(TracingSink));
        (gateway, manager, screening)
    }

    #[tokio::test]
    async fn test_create_and_cancel() {
        let (gateway, manager, screening) = setup();

        let booking = manager
            .create_booking(screening.id, "cust1", ["1-1", "1-2"])
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.total_cents, 2000);
        assert_eq!(manager.status_of(screening.id, "1-1").await.unwrap(), SeatStatus::Booked);

        let cancelled = manager.cancel_booking(booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(manager.status_of(screening.id, "1-2").await.unwrap(), SeatStatus::Free);

        let subjects: Vec<String> = gateway.notifications().into_iter().map(|n| n.subject).collect();
        assert_eq!(subjects, vec!["Booking Confirmation", "Cancel Confirmation"]);
    }

    #[tokio::test]
    async fn test_foreign_seat_is_rejected_before_holding() {
        let (_gateway, manager, screening) = setup();

        let err = manager
            .create_booking(screening.id, "cust1", ["1-1", "9-9"])
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidRequest(_)));
        assert_eq!(manager.availability(screening.id).await.unwrap().free, 20);
    }

    #[tokio::test]
    async fn test_unknown_screening() {
        let (_gateway, manager, _screening) = setup();
        let err = manager.create_booking(Uuid::new_v4(), "cust1", ["1-1"]).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));
        assert!(matches!(manager.cancel_booking(Uuid::new_v4()).await, Err(BookingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_coupon_checks() {
        let (gateway, manager, screening) = setup();
        gateway.add_coupon(Coupon {
            code: "OLD".to_string(),
            discount_percentage: 50,
            expires_on: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
        });

        let expired = BookingRequest::new(screening.id, "cust1", ["1-1"]).with_coupon("OLD");
        assert!(matches!(
            manager.create_booking_with(expired).await,
            Err(BookingError::InvalidRequest(_))
        ));

        let unknown = BookingRequest::new(screening.id, "cust1", ["1-1"]).with_coupon("NOPE");
        assert!(matches!(
            manager.create_booking_with(unknown).await,
            Err(BookingError::InvalidRequest(_))
        ));
        assert_eq!(manager.status_of(screening.id, "1-1").await.unwrap(), SeatStatus::Free);
    }

    #[tokio::test]
    async fn test_refund_in_flight_blocks_other_cancels() {
        let (_gateway, manager, screening) = setup();
        let booking = manager.create_booking(screening.id, "cust1", ["3-1"]).await.unwrap();

        let pending = manager.begin_cancel(booking.id, CancelKind::Refund).unwrap();
        assert_eq!(pending.id, booking.id);
        assert!(matches!(
            manager.cancel_booking(booking.id).await,
            Err(BookingError::InvalidTransition { ref from, .. }) if from == "REFUND_PENDING"
        ));

        manager.registry.lock().refunding.remove(&booking.id);
        manager.cancel_booking(booking.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_inactive_screening_refuses_bookings() {
        let (_gateway, manager, screening) = setup();
        manager.deactivate_screening(screening.id).await.unwrap();

        let err = manager.create_booking(screening.id, "cust1", ["1-1"]).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidRequest(_)));
        assert!(matches!(
            manager.deactivate_screening(screening.id).await,
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_expired_holds_are_swept() {
        let (_gateway, manager, screening) = setup();
        let manager = manager.with_hold_ttl(Duration::ZERO);

        let seats: BTreeSet<String> = ["2-1".to_string()].into_iter().collect();
        manager.ensure_registered(screening.id).await.unwrap();
        manager.ledger().try_hold(screening.id, Uuid::new_v4(), &seats).unwrap();

        assert_eq!(manager.sweep_expired_holds(), 1);
        assert_eq!(manager.status_of(screening.id, "2-1").await.unwrap(), SeatStatus::Free);
    }

    #[tokio::test]
    async fn test_seat_feed_reports_changes() {
        let (_gateway, manager, screening) = setup();
        let (tx, mut rx) = broadcast::channel(8);
        let manager = manager.with_seat_feed(tx);

        let booking = manager.create_booking(screening.id, "cust1", ["1-5"]).await.unwrap();
        manager.cancel_booking(booking.id).await.unwrap();

        let booked = rx.recv().await.unwrap();
        assert!(booked.booked);
        assert_eq!(booked.seat_ids, vec!["1-5".to_string()]);
        assert!(!rx.recv().await.unwrap().booked);
    }
}
