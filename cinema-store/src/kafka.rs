use async_trait::async_trait;
use cinema_core::{Notification, NotificationSink};
use cinema_shared::models::events::NotificationIssuedEvent;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

/// Publishes notifications as `NotificationIssuedEvent` JSON, keyed by customer.
#[derive(Clone)]
pub struct KafkaSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaSink {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    async fn publish(&self, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent notification to {}/{}: partition {} offset {}",
                    self.topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => Err(e),
        }
    }
}

#[async_trait]
impl NotificationSink for KafkaSink {
    async fn notify(&self, notification: Notification) {
        let event = NotificationIssuedEvent {
            notification_id: notification.id,
            customer_id: notification.customer_id.clone(),
            booking_id: notification.booking_id,
            subject: notification.subject,
            message: notification.message,
            timestamp: notification.created_at.timestamp(),
        };

        let payload = match serde_json::to_string(&event) {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to encode notification {}: {}", event.notification_id, e);
                return;
            }
        };

        if let Err(e) = self.publish(&event.customer_id, &payload).await {
            error!("Failed to publish notification {} to {}: {}", event.notification_id, self.topic, e);
        }
    }
}
