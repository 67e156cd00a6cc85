pub mod manager;
pub mod models;
pub mod notices;
pub mod orchestrator;

pub use manager::BookingManager;
pub use models::{BookingRequest, RestoreSummary};
pub use notices::Notice;
pub use orchestrator::{MockPaymentAdapter, PaymentOrchestrator};
