//! Aggregate-field P/L model for regular strategies.

use tickmon_core::{PlFigures, RegularStrategyData, StrategyType, TickSource};

use crate::scheduler::PlModel;

/// P/L from externally-supplied aggregates; no per-leg walk.
///
/// Unlike the algo model, snapshots are persisted regardless of market
/// state (intentional asymmetry).
pub struct RegularPl;

impl PlModel for RegularPl {
    type Data = RegularStrategyData;

    const STRATEGY_TYPE: StrategyType = StrategyType::Regular;
    const PERSIST_WHEN_CLOSED: bool = true;

    fn compute(data: &Self::Data, _ticks: &dyn TickSource) -> Option<PlFigures> {
        let total_pl = data.realized_pl + data.unrealized_pl - data.expenses;
        Some(PlFigures {
            total_pl,
            total_pl_mp: total_pl,
            market_price: data.spot_price,
        })
    }
}
