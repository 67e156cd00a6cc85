use uuid::Uuid;

/// Published whenever a customer notification is issued for a booking.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct NotificationIssuedEvent {
    pub notification_id: Uuid,
    pub customer_id: String,
    pub booking_id: Option<Uuid>,
    pub subject: String,
    pub message: String,
    pub timestamp: i64,
}

/// Emitted when seats of a screening change hands (booked or freed).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SeatsChangedEvent {
    pub screening_id: Uuid,
    pub seat_ids: Vec<String>,
    pub booked: bool,
    pub timestamp: i64,
}
