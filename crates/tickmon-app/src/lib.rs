//! Background tracking service for the trading dashboard.
//!
//! Orchestrates the market clock, the live-data subscription registry and
//! the per-strategy P/L tracking schedulers against the dashboard backend.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
