use cinema_core::BookingError;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Free,
    Held,
    Booked,
}

/// Seat state plus the booking that holds or owns it.
#[derive(Debug, Clone, Copy)]
struct SeatEntry {
    status: SeatStatus,
    owner: Option<Uuid>,
    held_at: Option<Instant>,
}

impl SeatEntry {
    fn free() -> Self {
        Self {
            status: SeatStatus::Free,
            owner: None,
            held_at: None,
        }
    }

    fn set(&mut self, status: SeatStatus, owner: Option<Uuid>) {
        self.status = status;
        self.owner = if status == SeatStatus::Free { None } else { owner };
        self.held_at = (status == SeatStatus::Held).then(Instant::now);
    }

    fn owned_by(&self, owner: Uuid) -> bool {
        self.owner == Some(owner)
    }
}

#[derive(Debug, Default)]
struct ScreeningSeats {
    seats: HashMap<String, SeatEntry>,
    /// No new holds once set.
    closed: bool,
}

/// Seat counts for one screening.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Availability {
    pub free: usize,
    pub held: usize,
    pub booked: usize,
}

impl Availability {
    pub fn total(&self) -> usize {
        self.free + self.held + self.booked
    }

    /// Share of seats that are not free.
    pub fn occupancy(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            1.0 - (self.free as f64 / self.total() as f64)
        }
    }
}

/// Authoritative reservation state per (screening, seat).
///
/// Each screening has its own mutex; every multi-seat transition checks and
/// mutates under that one lock, so it is all-or-nothing and two overlapping
/// holds can never both succeed. Screenings never lock each other.
///
/// Holds and bookings carry the id of the booking that owns them. Confirm
/// and release only act on seats owned by the caller, so a booking whose
/// hold expired can never touch seats that have since gone to someone else.
pub struct SeatLedger {
    screenings: RwLock<HashMap<Uuid, Arc<Mutex<ScreeningSeats>>>>,
}

impl SeatLedger {
    pub fn new() -> Self {
        Self {
            screenings: RwLock::new(HashMap::new()),
        }
    }

    /// Register the seats of a screening as Free. Seats already known keep
    /// their status.
    pub fn register_screening<I, S>(&self, screening_id: Uuid, seat_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let screening = {
            let mut screenings = self.screenings.write();
            screenings
                .entry(screening_id)
                .or_insert_with(|| Arc::new(Mutex::new(ScreeningSeats::default())))
                .clone()
        };
        let mut screening = screening.lock();
        for seat_id in seat_ids {
            screening.seats.entry(seat_id.into()).or_insert_with(SeatEntry::free);
        }
    }

    pub fn is_registered(&self, screening_id: &Uuid) -> bool {
        self.screenings.read().contains_key(screening_id)
    }

    pub fn status_of(&self, screening_id: Uuid, seat_id: &str) -> Result<SeatStatus, LedgerError> {
        let screening = self.screening(screening_id)?;
        let screening = screening.lock();
        screening
            .seats
            .get(seat_id)
            .map(|entry| entry.status)
            .ok_or_else(|| LedgerError::NotFound(format!("seat {} of screening {}", seat_id, screening_id)))
    }

    /// Free → Held on behalf of `owner`, for every seat or for none of them.
    pub fn try_hold(&self, screening_id: Uuid, owner: Uuid, seat_ids: &BTreeSet<String>) -> Result<(), LedgerError> {
        let screening = self.screening(screening_id)?;
        let mut screening = screening.lock();

        if screening.closed {
            return Err(LedgerError::Closed(screening_id));
        }
        Self::check_known(&screening.seats, screening_id, seat_ids)?;
        Self::check_free(&screening.seats, seat_ids)?;

        for id in seat_ids {
            if let Some(entry) = screening.seats.get_mut(id) {
                entry.set(SeatStatus::Held, Some(owner));
            }
        }
        debug!("Held {} seats of screening {} for {}", seat_ids.len(), screening_id, owner);
        Ok(())
    }

    /// Held → Booked for every seat, or for none of them. Every seat must
    /// still be held by `owner`; seats whose hold expired or moved on are
    /// reported as `HoldLost`.
    pub fn confirm(&self, screening_id: Uuid, owner: Uuid, seat_ids: &BTreeSet<String>) -> Result<(), LedgerError> {
        let screening = self.screening(screening_id)?;
        let mut screening = screening.lock();

        Self::check_known(&screening.seats, screening_id, seat_ids)?;

        let lost: Vec<String> = seat_ids
            .iter()
            .filter(|id| {
                screening
                    .seats
                    .get(*id)
                    .map_or(true, |e| e.status != SeatStatus::Held || !e.owned_by(owner))
            })
            .cloned()
            .collect();
        if !lost.is_empty() {
            return Err(LedgerError::HoldLost(lost));
        }

        for id in seat_ids {
            if let Some(entry) = screening.seats.get_mut(id) {
                entry.set(SeatStatus::Booked, Some(owner));
            }
        }
        Ok(())
    }

    /// Free → Booked in one step for `owner`. Used when replaying persisted
    /// bookings; ignores the closed flag.
    pub fn mark_booked(&self, screening_id: Uuid, owner: Uuid, seat_ids: &BTreeSet<String>) -> Result<(), LedgerError> {
        let screening = self.screening(screening_id)?;
        let mut screening = screening.lock();

        Self::check_known(&screening.seats, screening_id, seat_ids)?;
        Self::check_free(&screening.seats, seat_ids)?;

        for id in seat_ids {
            if let Some(entry) = screening.seats.get_mut(id) {
                entry.set(SeatStatus::Booked, Some(owner));
            }
        }
        Ok(())
    }

    /// Free every listed seat that `owner` holds or has booked. Seats owned
    /// by anyone else, or already free, are left alone. Returns how many
    /// seats were freed.
    pub fn release(&self, screening_id: Uuid, owner: Uuid, seat_ids: &BTreeSet<String>) -> Result<usize, LedgerError> {
        let screening = self.screening(screening_id)?;
        let mut screening = screening.lock();

        Self::check_known(&screening.seats, screening_id, seat_ids)?;

        let mut freed = 0;
        for id in seat_ids {
            if let Some(entry) = screening.seats.get_mut(id) {
                if entry.status != SeatStatus::Free && entry.owned_by(owner) {
                    entry.set(SeatStatus::Free, None);
                    freed += 1;
                }
            }
        }
        if freed < seat_ids.len() {
            debug!(
                "Released {} of {} seats of screening {} for {}",
                freed,
                seat_ids.len(),
                screening_id,
                owner
            );
        }
        Ok(freed)
    }

    /// Release holds older than `max_age`; returns what was freed.
    pub fn expire_holds(&self, max_age: Duration) -> Vec<(Uuid, String)> {
        let all: Vec<(Uuid, Arc<Mutex<ScreeningSeats>>)> = self
            .screenings
            .read()
            .iter()
            .map(|(id, seats)| (*id, seats.clone()))
            .collect();

        let mut expired = Vec::new();
        for (screening_id, screening) in all {
            let mut screening = screening.lock();
            for (seat_id, entry) in screening.seats.iter_mut() {
                let stale = entry.status == SeatStatus::Held
                    && entry.held_at.map_or(false, |at| at.elapsed() >= max_age);
                if stale {
                    entry.set(SeatStatus::Free, None);
                    expired.push((screening_id, seat_id.clone()));
                }
            }
        }
        expired
    }

    /// Stop taking holds for a screening. Refused with `Reserved` while any
    /// seat is held or booked; the check and the flag share one lock, so
    /// no hold can slip in between them.
    pub fn try_close(&self, screening_id: Uuid) -> Result<(), LedgerError> {
        let screening = self.screening(screening_id)?;
        let mut screening = screening.lock();

        let mut reserved: Vec<String> = screening
            .seats
            .iter()
            .filter(|(_, e)| e.status != SeatStatus::Free)
            .map(|(id, _)| id.clone())
            .collect();
        if !reserved.is_empty() {
            reserved.sort();
            return Err(LedgerError::Reserved(reserved));
        }

        screening.closed = true;
        Ok(())
    }

    /// Undo `try_close`.
    pub fn reopen(&self, screening_id: Uuid) -> Result<(), LedgerError> {
        self.screening(screening_id)?.lock().closed = false;
        Ok(())
    }

    pub fn is_closed(&self, screening_id: Uuid) -> Result<bool, LedgerError> {
        Ok(self.screening(screening_id)?.lock().closed)
    }

    pub fn availability(&self, screening_id: Uuid) -> Result<Availability, LedgerError> {
        let screening = self.screening(screening_id)?;
        let screening = screening.lock();
        let mut counts = Availability::default();
        for entry in screening.seats.values() {
            match entry.status {
                SeatStatus::Free => counts.free += 1,
                SeatStatus::Held => counts.held += 1,
                SeatStatus::Booked => counts.booked += 1,
            }
        }
        Ok(counts)
    }

    fn screening(&self, screening_id: Uuid) -> Result<Arc<Mutex<ScreeningSeats>>, LedgerError> {
        self.screenings
            .read()
            .get(&screening_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("screening {}", screening_id)))
    }

    fn check_known(
        seats: &HashMap<String, SeatEntry>,
        screening_id: Uuid,
        seat_ids: &BTreeSet<String>,
    ) -> Result<(), LedgerError> {
        let unknown: Vec<&str> = seat_ids
            .iter()
            .filter(|id| !seats.contains_key(*id))
            .map(String::as_str)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::NotFound(format!(
                "seats {} of screening {}",
                unknown.join(", "),
                screening_id
            )))
        }
    }

    fn check_free(seats: &HashMap<String, SeatEntry>, seat_ids: &BTreeSet<String>) -> Result<(), LedgerError> {
        let conflicts: Vec<String> = seat_ids
            .iter()
            .filter(|id| seats.get(*id).map(|e| e.status) != Some(SeatStatus::Free))
            .cloned()
            .collect();
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::SeatUnavailable(conflicts))
        }
    }
}

impl Default for SeatLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Not in ledger: {0}")]
    NotFound(String),

    #[error("Seats not free: {}", .0.join(", "))]
    SeatUnavailable(Vec<String>),

    #[error("Holds no longer owned: {}", .0.join(", "))]
    HoldLost(Vec<String>),

    #[error("Screening {0} is closed for booking")]
    Closed(Uuid),

    #[error("Seats still reserved: {}", .0.join(", "))]
    Reserved(Vec<String>),
}

impl From<LedgerError> for BookingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(what) => BookingError::NotFound(what),
            LedgerError::SeatUnavailable(seats) | LedgerError::HoldLost(seats) => {
                BookingError::SeatUnavailable(seats)
            }
            LedgerError::Closed(id) => {
                BookingError::InvalidRequest(format!("screening {} is no longer active", id))
            }
            LedgerError::Reserved(seats) => BookingError::InvalidTransition {
                from: format!("ACTIVE with {} reserved seats", seats.len()),
                to: "INACTIVE".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seats(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn ledger_with(screening_id: Uuid) -> SeatLedger {
        let ledger = SeatLedger::new();
        ledger.register_screening(screening_id, ["1-1", "1-2", "1-3"]);
        ledger
    }

    #[test]
    fn test_seat_lifecycle() {
        let screening = Uuid::new_v4();
        let ledger = ledger_with(screening);
        let owner = Uuid::new_v4();

        ledger.try_hold(screening, owner, &seats(&["1-1", "1-2"])).unwrap();
        assert_eq!(ledger.status_of(screening, "1-1").unwrap(), SeatStatus::Held);

        ledger.confirm(screening, owner, &seats(&["1-1", "1-2"])).unwrap();
        assert_eq!(ledger.status_of(screening, "1-2").unwrap(), SeatStatus::Booked);

        assert_eq!(ledger.release(screening, owner, &seats(&["1-1", "1-2"])).unwrap(), 2);
        assert_eq!(ledger.status_of(screening, "1-1").unwrap(), SeatStatus::Free);
    }

    #[test]
    fn test_hold_is_all_or_nothing() {
        let screening = Uuid::new_v4();
        let ledger = ledger_with(screening);

        ledger.try_hold(screening, Uuid::new_v4(), &seats(&["1-2"])).unwrap();

        let err = ledger
            .try_hold(screening, Uuid::new_v4(), &seats(&["1-1", "1-2", "1-3"]))
            .unwrap_err();
        match err {
            LedgerError::SeatUnavailable(conflicts) => assert_eq!(conflicts, vec!["1-2".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
        // Nothing else was touched
        assert_eq!(ledger.status_of(screening, "1-1").unwrap(), SeatStatus::Free);
        assert_eq!(ledger.status_of(screening, "1-3").unwrap(), SeatStatus::Free);
    }

    #[test]
    fn test_unknown_seat_mutates_nothing() {
        let screening = Uuid::new_v4();
        let ledger = ledger_with(screening);

        let err = ledger.try_hold(screening, Uuid::new_v4(), &seats(&["1-1", "9-9"])).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert_eq!(ledger.status_of(screening, "1-1").unwrap(), SeatStatus::Free);
        assert!(matches!(ledger.status_of(screening, "9-9"), Err(LedgerError::NotFound(_))));
        assert!(matches!(ledger.status_of(Uuid::new_v4(), "1-1"), Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn test_confirm_requires_own_hold() {
        let screening = Uuid::new_v4();
        let ledger = ledger_with(screening);
        let owner = Uuid::new_v4();

        ledger.try_hold(screening, owner, &seats(&["1-1"])).unwrap();
        let err = ledger.confirm(screening, owner, &seats(&["1-1", "1-2"])).unwrap_err();
        assert!(matches!(err, LedgerError::HoldLost(ref lost) if lost == &vec!["1-2".to_string()]));
        // 1-1 stays held
        assert_eq!(ledger.status_of(screening, "1-1").unwrap(), SeatStatus::Held);

        let err = ledger.confirm(screening, Uuid::new_v4(), &seats(&["1-1"])).unwrap_err();
        assert!(matches!(err, LedgerError::HoldLost(_)));
        assert_eq!(ledger.status_of(screening, "1-1").unwrap(), SeatStatus::Held);
    }

    #[test]
    fn test_release_skips_seats_owned_by_others() {
        let screening = Uuid::new_v4();
        let ledger = ledger_with(screening);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        ledger.try_hold(screening, first, &seats(&["1-1"])).unwrap();
        ledger.expire_holds(Duration::ZERO);
        ledger.try_hold(screening, second, &seats(&["1-1"])).unwrap();
        ledger.confirm(screening, second, &seats(&["1-1"])).unwrap();

        // The first booking cleaning up after itself must not free 1-1
        assert_eq!(ledger.release(screening, first, &seats(&["1-1"])).unwrap(), 0);
        assert_eq!(ledger.status_of(screening, "1-1").unwrap(), SeatStatus::Booked);
        assert!(matches!(
            ledger.confirm(screening, first, &seats(&["1-1"])),
            Err(LedgerError::HoldLost(_))
        ));
    }

    #[test]
    fn test_register_keeps_existing_status() {
        let screening = Uuid::new_v4();
        let ledger = ledger_with(screening);
        ledger.try_hold(screening, Uuid::new_v4(), &seats(&["1-1"])).unwrap();

        ledger.register_screening(screening, ["1-1", "1-4"]);
        assert_eq!(ledger.status_of(screening, "1-1").unwrap(), SeatStatus::Held);
        assert_eq!(ledger.status_of(screening, "1-4").unwrap(), SeatStatus::Free);
    }

    #[test]
    fn test_expire_holds() {
        let screening = Uuid::new_v4();
        let ledger = ledger_with(screening);
        let owner = Uuid::new_v4();
        ledger.try_hold(screening, Uuid::new_v4(), &seats(&["1-1"])).unwrap();
        ledger.try_hold(screening, owner, &seats(&["1-2"])).unwrap();
        ledger.confirm(screening, owner, &seats(&["1-2"])).unwrap();

        assert!(ledger.expire_holds(Duration::from_secs(3600)).is_empty());

        let expired = ledger.expire_holds(Duration::ZERO);
        assert_eq!(expired, vec![(screening, "1-1".to_string())]);
        assert_eq!(ledger.status_of(screening, "1-1").unwrap(), SeatStatus::Free);
        // Booked seats never expire
        assert_eq!(ledger.status_of(screening, "1-2").unwrap(), SeatStatus::Booked);
    }

    #[test]
    fn test_availability() {
        let screening = Uuid::new_v4();
        let ledger = ledger_with(screening);
        assert_eq!(ledger.availability(screening).unwrap().free, 3);

        ledger.mark_booked(screening, Uuid::new_v4(), &seats(&["1-1"])).unwrap();
        ledger.try_hold(screening, Uuid::new_v4(), &seats(&["1-2"])).unwrap();

        let counts = ledger.availability(screening).unwrap();
        assert_eq!(counts, Availability { free: 1, held: 1, booked: 1 });
        assert!((counts.occupancy() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_close_and_reopen() {
        let screening = Uuid::new_v4();
        let ledger = ledger_with(screening);
        let owner = Uuid::new_v4();

        ledger.try_hold(screening, owner, &seats(&["1-3"])).unwrap();
        match ledger.try_close(screening).unwrap_err() {
            LedgerError::Reserved(seats) => assert_eq!(seats, vec!["1-3".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!ledger.is_closed(screening).unwrap());

        ledger.release(screening, owner, &seats(&["1-3"])).unwrap();
        ledger.try_close(screening).unwrap();
        assert!(matches!(
            ledger.try_hold(screening, Uuid::new_v4(), &seats(&["1-1"])),
            Err(LedgerError::Closed(_))
        ));

        ledger.reopen(screening).unwrap();
        ledger.try_hold(screening, Uuid::new_v4(), &seats(&["1-1"])).unwrap();
    }

    #[test]
    fn test_concurrent_overlapping_holds() {
        let screening = Uuid::new_v4();
        let ledger = Arc::new(ledger_with(screening));

        for _ in 0..50 {
            let handles: Vec<_> = [vec!["1-1", "1-2"], vec!["1-2", "1-3"]]
                .into_iter()
                .map(|ids| {
                    let ledger = ledger.clone();
                    std::thread::spawn(move || ledger.try_hold(screening, Uuid::new_v4(), &seats(&ids)).is_ok())
                })
                .collect();
            let wins = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
            assert_eq!(wins, 1);
            ledger.expire_holds(Duration::ZERO);
        }
    }

    #[test]
    fn test_concurrent_close_and_hold() {
        for _ in 0..50 {
            let screening = Uuid::new_v4();
            let ledger = Arc::new(ledger_with(screening));

            let holder = {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.try_hold(screening, Uuid::new_v4(), &seats(&["1-1"])).is_ok())
            };
            let closer = {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.try_close(screening).is_ok())
            };
            let held = holder.join().unwrap();
            let closed = closer.join().unwrap();

            // Never both
            assert!(held != closed);
            assert_eq!(ledger.availability(screening).unwrap().held == 1, held);
        }
    }
}
