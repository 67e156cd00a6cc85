use cinema_core::PersistenceGateway;
use cinema_order::BookingManager;
use cinema_store::JsonFileGateway;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// Periodically release seat holds that outlived the hold TTL.
pub async fn start_hold_sweeper(manager: Arc<BookingManager>, every: Duration) {
    let mut ticker = interval(every);
    info!("Hold sweeper started, running every {:?}", every);

    loop {
        ticker.tick().await;
        let released = manager.sweep_expired_holds();
        if released > 0 {
            info!("Sweeper released {} seats", released);
        }
    }
}

/// Log free/held/booked counts for every active screening.
pub async fn log_availability(manager: &BookingManager, gateway: &JsonFileGateway) {
    let screenings = match gateway.list_screenings().await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to list screenings: {}", e);
            return;
        }
    };

    for screening in screenings.iter().filter(|s| s.is_active) {
        match manager.availability(screening.id).await {
            Ok(a) => info!(
                "Screening {} on {} at {}: {} free, {} held, {} booked ({:.0}% full)",
                screening.id,
                screening.screening_date,
                screening.start_time,
                a.free,
                a.held,
                a.booked,
                a.occupancy() * 100.0
            ),
            Err(e) => error!("Availability for screening {} failed: {}", screening.id, e),
        }
    }
}
