use cinema_core::payment::{CardDetails, PaymentAdapter, PaymentReceipt, PaymentStatus};
use cinema_core::{Amount, Booking, BookingError};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Runs booking charges and refunds through a payment adapter.
pub struct PaymentOrchestrator {
    adapter: Arc<dyn PaymentAdapter>,
}

impl PaymentOrchestrator {
    pub fn new(adapter: Arc<dyn PaymentAdapter>) -> Self {
        Self { adapter }
    }

    /// Charge the booking total. Declines and adapter failures both come
    /// back as `PaymentDeclined`.
    pub async fn charge(&self, booking: &Booking, card: &CardDetails) -> Result<PaymentReceipt, BookingError> {
        let receipt = self
            .adapter
            .charge(booking.id, booking.total_cents, card)
            .await
            .map_err(|e| BookingError::PaymentDeclined(e.to_string()))?;

        if receipt.status != PaymentStatus::Succeeded {
            warn!("Payment for booking {} declined (card ending {})", booking.id, card.number.last_four());
            return Err(BookingError::PaymentDeclined(format!(
                "card ending {} was declined",
                card.number.last_four()
            )));
        }

        info!("Charged {} cents for booking {}", booking.total_cents, booking.id);
        Ok(receipt)
    }

    /// Refund a charged booking. Bookings without a payment reference are skipped.
    pub async fn refund(&self, booking: &Booking) -> Result<Option<PaymentReceipt>, BookingError> {
        let Some(reference) = booking.payment_reference.as_deref() else {
            return Ok(None);
        };

        let receipt = self
            .adapter
            .refund(booking.id, reference, booking.total_cents)
            .await
            .map_err(|e| BookingError::PaymentDeclined(format!("refund failed: {}", e)))?;

        info!("Refunded {} cents for booking {}", booking.total_cents, booking.id);
        Ok(Some(receipt))
    }
}

/// Approves every card except numbers ending in `0000`.
pub struct MockPaymentAdapter;

#[async_trait::async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn charge(
        &self,
        booking_id: Uuid,
        amount_cents: Amount,
        card: &CardDetails,
    ) -> Result<PaymentReceipt, Box<dyn std::error::Error + Send + Sync>> {
        let status = if card.number.expose().ends_with("0000") {
            PaymentStatus::Declined
        } else {
            PaymentStatus::Succeeded
        };

        Ok(PaymentReceipt {
            reference: format!("mock_ch_{}", booking_id.simple()),
            booking_id,
            amount_cents,
            status,
            created_at: chrono::Utc::now(),
        })
    }

    async fn refund(
        &self,
        booking_id: Uuid,
        reference: &str,
        amount_cents: Amount,
    ) -> Result<PaymentReceipt, Box<dyn std::error::Error + Send + Sync>> {
        if !reference.starts_with("mock_ch_") {
            return Err(format!("unknown charge {}", reference).into());
        }

        Ok(PaymentReceipt {
            reference: format!("mock_re_{}", booking_id.simple()),
            booking_id,
            amount_cents,
            status: PaymentStatus::Refunded,
            created_at: chrono::Utc::now(),
        })
    }
}
