pub mod seed;
pub mod state;
pub mod worker;

pub use state::AppState;
