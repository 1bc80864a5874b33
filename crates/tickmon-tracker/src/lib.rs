//! Per-strategy periodic P/L snapshot schedulers.
//!
//! A `TrackingScheduler` owns the registry of tracked strategies and one
//! recurring timer per strategy. Each cycle computes a profit/loss snapshot
//! from live tick data (or pre-aggregated fields) and sends it to the
//! persistence collaborator. Two models exist:
//!
//! - `AlgoPl`: per-leg tick walk, persistence gated on market hours
//! - `RegularPl`: pre-aggregated fields, persists regardless of market state
//!
//! The gating asymmetry is intentional and must not be unified away;
//! see `PlModel::PERSIST_WHEN_CLOSED`.

pub mod algo;
pub mod regular;
pub mod scheduler;

pub use algo::AlgoPl;
pub use regular::RegularPl;
pub use scheduler::{AlgoTracker, PlModel, RegularTracker, TrackingScheduler, SNAPSHOT_INTERVAL_MS};
