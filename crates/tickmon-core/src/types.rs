//! Shared domain types and service seams.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Instruments and live data
// ============================================================================

/// Unique identifier for a tradable instrument on the broker feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentToken(String);

impl InstrumentToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstrumentToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InstrumentToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One live-data subscription held by the registry.
///
/// Market fields are optional: a freshly subscribed token has no tick yet,
/// and the upstream feed may omit depth fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub instrument_token: InstrumentToken,
    #[serde(default)]
    pub trading_symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    /// Last traded price.
    #[serde(default)]
    pub ltp: Option<Decimal>,
    #[serde(default)]
    pub bid_price: Option<Decimal>,
    #[serde(default)]
    pub ask_price: Option<Decimal>,
    #[serde(default)]
    pub bid_qty: Option<Decimal>,
    #[serde(default)]
    pub ask_qty: Option<Decimal>,
    #[serde(default)]
    pub tick_time: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Bare subscription for a token with no tick data yet.
    #[must_use]
    pub fn new(instrument_token: InstrumentToken) -> Self {
        Self {
            instrument_token,
            trading_symbol: None,
            name: None,
            exchange: None,
            ltp: None,
            bid_price: None,
            ask_price: None,
            bid_qty: None,
            ask_qty: None,
            tick_time: None,
        }
    }
}

/// Webhook/ticker connection status as seen by the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStatus {
    pub ticker_connected: bool,
    pub loading: bool,
}

// ============================================================================
// Market clock
// ============================================================================

/// Broadcast payload of the market clock: recomputed on every poll tick,
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketState {
    pub is_open: bool,
    pub evaluated_at: DateTime<Utc>,
}

impl MarketState {
    /// Evaluate the market state at the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self {
            is_open: crate::market_hours::is_open_now(),
            evaluated_at: Utc::now(),
        }
    }
}

// ============================================================================
// Strategies and P/L
// ============================================================================

/// Strategy bookkeeping style. Algo strategies compute P/L from per-leg
/// ticks, regular strategies from pre-aggregated fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyType {
    Algo,
    Regular,
}

impl std::fmt::Display for StrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Algo => write!(f, "algo"),
            Self::Regular => write!(f, "regular"),
        }
    }
}

/// One instrument position composing an algo strategy.
/// Sign of `quantity` carries the direction (negative = short).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyLeg {
    pub instrument_token: InstrumentToken,
    pub quantity: Decimal,
    pub price: Decimal,
}

/// Tracked data for an algo strategy.
///
/// `legs: None` models strategy data that lacks the instrument-leg list;
/// snapshot computation aborts silently in that case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgoStrategyData {
    #[serde(default)]
    pub legs: Option<Vec<StrategyLeg>>,
}

/// Tracked data for a regular strategy: externally-supplied aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegularStrategyData {
    pub realized_pl: Decimal,
    pub unrealized_pl: Decimal,
    pub expenses: Decimal,
    #[serde(default)]
    pub spot_price: Option<Decimal>,
}

/// Output of one P/L computation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlFigures {
    pub total_pl: Decimal,
    /// P/L valued at the executable side of the book (bid for longs,
    /// ask for shorts) instead of the last traded price.
    pub total_pl_mp: Decimal,
    pub market_price: Option<Decimal>,
}

/// One profit/loss measurement sent to the persistence collaborator.
/// Write-once from the scheduler's point of view; no local copy retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlSnapshot {
    pub strategy_id: i64,
    pub strategy_type: StrategyType,
    pub total_pl: Decimal,
    pub total_pl_mp: Decimal,
    pub market_price: Option<Decimal>,
    pub market_hours: bool,
}

/// Read-only view of which strategies a scheduler currently tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingStatus {
    pub strategy_ids: Vec<i64>,
    pub total_strategies: usize,
}

// ============================================================================
// Service seams
// ============================================================================

/// Source of current tick data for an instrument.
///
/// Implemented by the subscription registry; stubbed in scheduler tests.
pub trait TickSource: Send + Sync {
    /// Get the current subscription (with tick fields) for a token.
    ///
    /// Returns `None` if the token is not subscribed or has no data.
    fn tick(&self, token: &InstrumentToken) -> Option<Subscription>;
}

/// Source of the current market-open flag.
///
/// Implemented by the market clock; stubbed in scheduler tests.
pub trait MarketHours: Send + Sync {
    fn is_open(&self) -> bool;
}
