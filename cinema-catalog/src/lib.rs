pub mod ledger;
pub mod pricing;

pub use ledger::{Availability, LedgerError, SeatLedger, SeatStatus};
pub use pricing::PricingEngine;
