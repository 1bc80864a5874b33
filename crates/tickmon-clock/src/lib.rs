//! Market-hours poll-and-broadcast service.

pub mod clock;

pub use clock::{MarketClock, DEFAULT_POLL_INTERVAL_MS};
