use async_trait::async_trait;
use cinema_core::{Notification, NotificationSink};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Writes each notification to the log and nothing else.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, notification: Notification) {
        info!(
            customer = %notification.customer_id,
            booking = ?notification.booking_id,
            "{}: {}",
            notification.subject,
            notification.message
        );
    }
}

/// Fans notifications out to in-process subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    async fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("No notification subscribers, dropping");
        }
    }
}

/// Delivers to several sinks in order.
pub struct FanoutSink {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl NotificationSink for FanoutSink {
    async fn notify(&self, notification: Notification) {
        for sink in &self.sinks {
            sink.notify(notification.clone()).await;
        }
    }
}
