//! Per-leg P/L model for algo strategies.

use rust_decimal::Decimal;
use tracing::trace;

use tickmon_core::{AlgoStrategyData, PlFigures, StrategyType, TickSource};

use crate::scheduler::PlModel;

/// P/L from live ticks, one term per instrument leg.
///
/// Snapshots are persisted only during market hours. Whether that gating
/// is intentional (algo strategies only meaningful intraday) or an
/// oversight is an open product question; it stays as-is for now.
pub struct AlgoPl;

impl PlModel for AlgoPl {
    type Data = AlgoStrategyData;

    const STRATEGY_TYPE: StrategyType = StrategyType::Algo;
    const PERSIST_WHEN_CLOSED: bool = false;

    fn compute(data: &Self::Data, ticks: &dyn TickSource) -> Option<PlFigures> {
        let legs = data.legs.as_ref()?;

        let mut total_pl = Decimal::ZERO;
        let mut total_pl_mp = Decimal::ZERO;
        let mut market_price = None;

        for (idx, leg) in legs.iter().enumerate() {
            let Some(tick) = ticks.tick(&leg.instrument_token) else {
                trace!(token = %leg.instrument_token, "No tick data for leg, skipping");
                continue;
            };
            let Some(ltp) = tick.ltp else {
                trace!(token = %leg.instrument_token, "Tick has no LTP, skipping leg");
                continue;
            };

            // Same formula long and short; the sign rides on quantity.
            total_pl += (ltp - leg.price) * leg.quantity;

            if idx == 0 {
                market_price = Some(ltp);
            }

            // Market-price P/L substitutes the executable side of the book:
            // bid when closing a long, ask when covering a short. The same
            // (tick - entry) * qty shape is kept for both directions; the
            // spread-direction question is tracked as an open product
            // question, not corrected here.
            let mp_side = if leg.quantity > Decimal::ZERO {
                tick.bid_price
            } else {
                tick.ask_price
            };
            if let Some(mp) = mp_side {
                total_pl_mp += (mp - leg.price) * leg.quantity;
            } else {
                trace!(token = %leg.instrument_token, "Tick has no book price, skipping leg in MP total");
            }
        }

        Some(PlFigures {
            total_pl,
            total_pl_mp,
            market_price,
        })
    }
}
