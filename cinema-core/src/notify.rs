use async_trait::async_trait;

use crate::models::Notification;

/// Receives booking lifecycle notifications.
///
/// Fire-and-forget: implementations log their own delivery failures and
/// never report them back to the booking flow.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}
