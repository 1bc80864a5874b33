//! REST clients for the dashboard's collaborator services.
//!
//! Two surfaces:
//! - `TickerApi`: the webhook/ticker connection manager
//!   (`/api/zerodha-ws/*`)
//! - `PlHistoryApi`: strategy P/L snapshot persistence
//!   (`/api/strategy-pl-history/`)
//!
//! Both are dyn-safe async traits so the services above them can be tested
//! against mocks.

pub mod client;
pub mod error;

pub use client::{DashboardClient, HistoryQuery, PlHistoryApi, PlRecord, TickerApi};
pub use error::{ApiError, ApiResult};
