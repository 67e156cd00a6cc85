use anyhow::Context;
use cinema_core::NotificationSink;
use cinema_order::{BookingManager, MockPaymentAdapter, PaymentOrchestrator, RestoreSummary};
use cinema_shared::models::events::SeatsChangedEvent;
use cinema_store::app_config::Config;
use cinema_store::{BroadcastSink, FanoutSink, JsonFileGateway, TracingSink};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Everything the process shares: storage, the booking manager and the
/// in-process feeds.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<JsonFileGateway>,
    pub manager: Arc<BookingManager>,
    pub notifications: BroadcastSink,
    pub seat_tx: broadcast::Sender<SeatsChangedEvent>,
}

impl AppState {
    /// Open the store, wire the sinks and bring the ledger back to the
    /// persisted state.
    pub async fn build(config: Config) -> anyhow::Result<(Self, RestoreSummary)> {
        let gateway = Arc::new(
            JsonFileGateway::open(&config.storage.data_dir)
                .await
                .with_context(|| format!("opening data dir {}", config.storage.data_dir.display()))?,
        );

        let notifications = BroadcastSink::new(config.notifications.channel_capacity);
        let mut sinks: Vec<Box<dyn NotificationSink>> = vec![Box::new(notifications.clone())];
        if config.notifications.log_notifications {
            sinks.push(Box::new(TracingSink));
        }

        #[cfg(feature = "kafka")]
        if let Some(kafka) = &config.kafka {
            let sink = cinema_store::KafkaSink::new(&kafka.brokers, &kafka.topic)
                .context("creating Kafka producer")?;
            info!("Publishing notifications to {} on {}", kafka.topic, kafka.brokers);
            sinks.push(Box::new(sink));
        }
        #[cfg(not(feature = "kafka"))]
        if config.kafka.is_some() {
            tracing::warn!("Kafka configured but the kafka feature is off, ignoring");
        }

        let (seat_tx, _) = broadcast::channel(config.notifications.channel_capacity.max(1));

        let manager = BookingManager::new(gateway.clone(), Arc::new(FanoutSink::new(sinks)))
            .with_payments(PaymentOrchestrator::new(Arc::new(MockPaymentAdapter)))
            .with_seat_feed(seat_tx.clone())
            .with_hold_ttl(config.business_rules.seat_hold_ttl());

        let summary = manager.restore().await.context("restoring bookings")?;
        info!(
            "Booking state restored from {}: {:?}",
            gateway.data_dir().display(),
            summary
        );

        Ok((
            Self {
                config,
                gateway,
                manager: Arc::new(manager),
                notifications,
                seat_tx,
            },
            summary,
        ))
    }
}
