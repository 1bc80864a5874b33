//! Live-data subscription registry.
//!
//! Holds the webhook/ticker connection state and the current subscription
//! set, refreshed by a poll loop that runs only while polling is enabled
//! and the market is open.

pub mod registry;

pub use registry::{
    RegistrySnapshot, SubscriptionRegistry, DEFAULT_POLL_INTERVAL_MS, STATUS_CHECK_THROTTLE_MS,
};
