pub mod app_config;
pub mod json_repo;
pub mod memory;
pub mod sinks;
#[cfg(feature = "kafka")]
pub mod kafka;

pub use json_repo::{HallRecord, JsonFileGateway};
pub use memory::MemoryGateway;
pub use sinks::{BroadcastSink, FanoutSink, TracingSink};
#[cfg(feature = "kafka")]
pub use kafka::KafkaSink;
