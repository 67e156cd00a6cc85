use cinema_core::CardDetails;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Everything needed to book seats for one screening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub screening_id: Uuid,
    pub customer_id: String,
    pub seat_ids: BTreeSet<String>,
    pub coupon_code: Option<String>,
    /// Charged through the payment adapter when both are present.
    pub card: Option<CardDetails>,
}

impl BookingRequest {
    pub fn new<I, S>(screening_id: Uuid, customer_id: impl Into<String>, seat_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            screening_id,
            customer_id: customer_id.into(),
            seat_ids: seat_ids.into_iter().map(Into::into).collect(),
            coupon_code: None,
            card: None,
        }
    }

    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon_code = Some(code.into());
        self
    }

    pub fn with_card(mut self, card: CardDetails) -> Self {
        self.card = Some(card);
        self
    }
}

/// What `BookingManager::restore` found in storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    pub screenings: usize,
    pub bookings: usize,
    pub active_bookings: usize,
    pub abandoned: usize,
    pub conflicts: usize,
}
