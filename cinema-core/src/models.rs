use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::{Amount, BookingError};

/// Seats are laid out in rows of this width.
pub const SEATS_PER_ROW: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub language: String,
    pub genre: String,
    pub country: String,
    pub release_date: NaiveDate,
    pub duration_mins: u32,
    pub description: String,
    pub is_active: bool,
}

impl Movie {
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CinemaHall {
    pub id: Uuid,
    pub name: String,
    pub capacity: u32,
}

impl CinemaHall {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            capacity,
        }
    }

    /// Generate the seat plan: `capacity / 10` full rows, all at one price.
    pub fn layout_seats(&self, price_cents: Amount) -> Vec<CinemaHallSeat> {
        let rows = self.capacity / SEATS_PER_ROW;
        (1..=rows)
            .flat_map(|row| {
                (1..=SEATS_PER_ROW).map(move |seat| CinemaHallSeat::new(row, seat, price_cents))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CinemaHallSeat {
    pub seat_id: String,
    pub row_number: u32,
    pub seat_number: u32,
    pub price_cents: Amount,
}

impl CinemaHallSeat {
    pub fn new(row_number: u32, seat_number: u32, price_cents: Amount) -> Self {
        Self {
            seat_id: Self::id_for(row_number, seat_number),
            row_number,
            seat_number,
            price_cents,
        }
    }

    pub fn id_for(row_number: u32, seat_number: u32) -> String {
        format!("{}-{}", row_number, seat_number)
    }
}

/// A showing of a movie in a hall. `seat_ids` keeps the hall's seat order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Screening {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub hall_id: Uuid,
    pub screening_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub seat_ids: Vec<String>,
    pub is_active: bool,
}

impl Screening {
    pub fn new(
        movie_id: Uuid,
        hall: &CinemaHall,
        seats: &[CinemaHallSeat],
        screening_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            movie_id,
            hall_id: hall.id,
            screening_date,
            start_time,
            end_time,
            seat_ids: seats.iter().map(|s| s.seat_id.clone()).collect(),
            is_active: true,
        }
    }

    pub fn has_seat(&self, seat_id: &str) -> bool {
        self.seat_ids.iter().any(|s| s == seat_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }
}

/// A customer's reservation of seats. Never deleted; cancellation is a status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub screening_id: Uuid,
    pub customer_id: String,
    pub seat_ids: BTreeSet<String>,
    pub status: BookingStatus,
    pub total_cents: Amount,
    pub coupon_code: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        screening_id: Uuid,
        customer_id: String,
        seat_ids: BTreeSet<String>,
        total_cents: Amount,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            screening_id,
            customer_id,
            seat_ids,
            status: BookingStatus::Pending,
            total_cents,
            coupon_code: None,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, rejecting anything outside Pending → Confirmed → Cancelled.
    pub fn transition(&mut self, next: BookingStatus) -> Result<(), BookingError> {
        if !self.status.can_transition_to(next) {
            return Err(BookingError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), BookingError> {
        self.transition(BookingStatus::Confirmed)
    }

    pub fn cancel(&mut self) -> Result<(), BookingError> {
        self.transition(BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub customer_id: String,
    pub subject: String,
    pub message: String,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        customer_id: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
        booking_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id: customer_id.into(),
            subject: subject.into(),
            message: message.into(),
            booking_id,
            created_at: Utc::now(),
        }
    }
}

/// Percentage discount valid up to and including `expires_on`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coupon {
    pub code: String,
    pub discount_percentage: u8,
    pub expires_on: NaiveDate,
}

impl Coupon {
    pub fn is_valid_on(&self, day: NaiveDate) -> bool {
        day <= self.expires_on && self.discount_percentage <= 100
    }
}
