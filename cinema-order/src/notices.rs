use cinema_core::{Booking, Notification};

/// Customer-facing messages sent on booking transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    BookingConfirmed,
    BookingCancelled,
    BookingRefunded,
}

impl Notice {
    pub fn subject(&self) -> &'static str {
        match self {
            Notice::BookingConfirmed => "Booking Confirmation",
            Notice::BookingCancelled => "Cancel Confirmation",
            Notice::BookingRefunded => "Refund Confirmation",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Notice::BookingConfirmed => {
                "Your booking has been confirmed! Thank you for choosing Lincoln Cinema."
            }
            Notice::BookingCancelled => "Your booking has been canceled!",
            Notice::BookingRefunded => {
                "Due to the screening cancellation, your booking has been refunded. We apologize for any inconvenience caused."
            }
        }
    }

    pub fn for_booking(&self, booking: &Booking) -> Notification {
        Notification::new(
            booking.customer_id.clone(),
            self.subject(),
            self.message(),
            Some(booking.id),
        )
    }
}
