//! Structured logging for the tracking services.
//!
//! JSON output in production, pretty output in development. Services never
//! touch the global subscriber themselves; the binary initializes it once.

pub mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
