use async_trait::async_trait;
use chrono::{DateTime, Months, NaiveDate, Utc};
use cinema_shared::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, BookingError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Succeeded,
    Declined,
    Refunded,
}

/// Card used to pay for a booking. Number and holder never show up in logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub number: Masked<String>,
    pub holder_name: Masked<String>,
    pub expiry: String, // MM/YYYY
}

impl CardDetails {
    pub fn new(number: &str, holder_name: &str, expiry: &str) -> Self {
        Self {
            number: Masked::new(number.to_string()),
            holder_name: Masked::new(holder_name.to_string()),
            expiry: expiry.to_string(),
        }
    }

    /// Last day the card can be charged, or `None` if the expiry is not
    /// a valid `MM/YYYY`.
    pub fn valid_through(&self) -> Option<NaiveDate> {
        let (month, year) = self.expiry.trim().split_once('/')?;
        if month.len() != 2 || year.len() != 4 {
            return None;
        }
        let month: u32 = month.parse().ok()?;
        let year: i32 = year.parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, 1)?
            .checked_add_months(Months::new(1))?
            .pred_opt()
    }

    /// Reject malformed or expired cards before anything is charged.
    pub fn validate(&self, today: NaiveDate) -> Result<(), BookingError> {
        match self.valid_through() {
            None => Err(BookingError::InvalidRequest(format!(
                "card expiry {:?} is not MM/YYYY",
                self.expiry
            ))),
            Some(last_day) if last_day < today => Err(BookingError::InvalidRequest(format!(
                "card ending {} expired {}",
                self.number.last_four(),
                self.expiry
            ))),
            Some(_) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub reference: String, // Provider's id
    pub booking_id: Uuid,
    pub amount_cents: Amount,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Charge the booking total to a card
    async fn charge(
        &self,
        booking_id: Uuid,
        amount_cents: Amount,
        card: &CardDetails,
    ) -> Result<PaymentReceipt, Box<dyn std::error::Error + Send + Sync>>;

    /// Refund a previous charge in full
    async fn refund(
        &self,
        booking_id: Uuid,
        reference: &str,
        amount_cents: Amount,
    ) -> Result<PaymentReceipt, Box<dyn std::error::Error + Send + Sync>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(expiry: &str) -> CardDetails {
        CardDetails::new("4111111111111111", "Jo Bloggs", expiry)
    }

    #[test]
    fn test_valid_through_is_end_of_month() {
        assert_eq!(card("02/2028").valid_through(), NaiveDate::from_ymd_opt(2028, 2, 29));
        assert_eq!(card("12/2030").valid_through(), NaiveDate::from_ymd_opt(2030, 12, 31));
    }

    #[test]
    fn test_malformed_expiry() {
        for bad in ["", "13/2030", "1/2030", "01/30", "01-2030", "ab/cdef"] {
            assert!(card(bad).valid_through().is_none(), "{bad}");
            assert!(matches!(
                card(bad).validate(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
                Err(BookingError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn test_expired_card() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert!(card("06/2024").validate(today).is_ok());
        assert!(matches!(card("05/2024").validate(today), Err(BookingError::InvalidRequest(_))));
    }
}
