//! Core domain types for the tickmon tracking subsystem.
//!
//! This crate provides the types shared by the background services:
//! - `InstrumentToken`, `Subscription`: live market data identities
//! - `StrategyType`, strategy data payloads, `PlSnapshot`: P/L bookkeeping
//! - `MarketState`: broadcast payload of the market clock
//! - `TickSource`, `MarketHours`: seams between the services

pub mod market_hours;
pub mod types;

pub use market_hours::{is_open_at, is_open_now, MARKET_CLOSE_MINUTE, MARKET_OPEN_MINUTE};
pub use types::{
    AlgoStrategyData, InstrumentToken, MarketHours, MarketState, PlFigures, PlSnapshot,
    RegularStrategyData, StrategyLeg, StrategyType, Subscription, TickSource, TrackingStatus,
    WebhookStatus,
};
