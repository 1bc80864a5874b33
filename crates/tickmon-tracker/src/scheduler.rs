//! Generic per-strategy tracking scheduler.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use tickmon_api::PlHistoryApi;
use tickmon_core::{MarketHours, PlFigures, PlSnapshot, StrategyType, TickSource, TrackingStatus};

/// Snapshot period per tracked strategy: 5 minutes.
pub const SNAPSHOT_INTERVAL_MS: u64 = 300_000;

/// A P/L computation model, parameterizing the scheduler.
pub trait PlModel: Send + Sync + 'static {
    /// Strategy data the model computes from.
    type Data: Clone + Send + Sync + 'static;

    /// Strategy type stamped on persisted snapshots.
    const STRATEGY_TYPE: StrategyType;

    /// Whether snapshots are persisted outside market hours.
    ///
    /// False for algo strategies, true for regular strategies. The
    /// asymmetry is intentional; flip it only on a product decision,
    /// not as a cleanup.
    const PERSIST_WHEN_CLOSED: bool;

    /// Compute P/L figures, or `None` when the data cannot yield a
    /// snapshot (e.g., no instrument-leg list).
    fn compute(data: &Self::Data, ticks: &dyn TickSource) -> Option<PlFigures>;
}

struct TrackedEntity<D> {
    /// Strategy data, swappable without disturbing the timer.
    data: Arc<RwLock<D>>,
    /// Serializes snapshot cycles for this entity. The 5-minute period
    /// makes overlap unlikely; the gate makes it impossible.
    snapshot_gate: Arc<tokio::sync::Mutex<()>>,
    last_update: DateTime<Utc>,
    cancel: CancellationToken,
}

/// Everything one snapshot cycle needs, detached from the scheduler so the
/// timer task holds no reference back into it.
struct SnapshotCycle<M: PlModel> {
    persistence: Arc<dyn PlHistoryApi>,
    ticks: Arc<dyn TickSource>,
    hours: Arc<dyn MarketHours>,
    data: Arc<RwLock<M::Data>>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<M: PlModel> SnapshotCycle<M> {
    /// Compute one snapshot and send it to persistence.
    ///
    /// Every failure mode degrades to no-op-until-next-cycle: uncomputable
    /// data skips silently; a failed save is logged and abandoned (the next
    /// cycle is the de facto retry).
    async fn run(&self, strategy_id: i64) {
        let _cycle = self.gate.lock().await;

        let data = self.data.read().clone();
        let Some(figures) = M::compute(&data, self.ticks.as_ref()) else {
            trace!(strategy_id, "No computable P/L, skipping snapshot");
            return;
        };

        let market_hours = self.hours.is_open();
        if !market_hours && !M::PERSIST_WHEN_CLOSED {
            debug!(
                strategy_id,
                strategy_type = %M::STRATEGY_TYPE,
                "Market closed, snapshot not persisted"
            );
            return;
        }

        let snapshot = PlSnapshot {
            strategy_id,
            strategy_type: M::STRATEGY_TYPE,
            total_pl: figures.total_pl,
            total_pl_mp: figures.total_pl_mp,
            market_price: figures.market_price,
            market_hours,
        };

        if let Err(e) = self.persistence.save_snapshot(&snapshot).await {
            warn!(strategy_id, error = %e, "Snapshot save failed, next cycle retries");
        }
    }
}

/// Per-strategy periodic snapshot scheduler.
///
/// Owns the tracked-entity registry and its timers exclusively; consumers
/// reference strategies by id only and never hold timer handles. At most
/// one entity record and one active timer exist per strategy id.
pub struct TrackingScheduler<M: PlModel> {
    persistence: Arc<dyn PlHistoryApi>,
    ticks: Arc<dyn TickSource>,
    hours: Arc<dyn MarketHours>,
    snapshot_interval: Duration,
    entities: DashMap<i64, TrackedEntity<M::Data>>,
    _model: PhantomData<M>,
}

/// Scheduler for algo strategies (per-leg tick P/L).
pub type AlgoTracker = TrackingScheduler<crate::algo::AlgoPl>;

/// Scheduler for regular strategies (pre-aggregated P/L).
pub type RegularTracker = TrackingScheduler<crate::regular::RegularPl>;

impl<M: PlModel> TrackingScheduler<M> {
    /// Create a scheduler with an explicit snapshot period.
    #[must_use]
    pub fn new(
        persistence: Arc<dyn PlHistoryApi>,
        ticks: Arc<dyn TickSource>,
        hours: Arc<dyn MarketHours>,
        snapshot_interval: Duration,
    ) -> Self {
        Self {
            persistence,
            ticks,
            hours,
            snapshot_interval,
            entities: DashMap::new(),
            _model: PhantomData,
        }
    }

    /// Create a scheduler with the default 5-minute period.
    #[must_use]
    pub fn with_defaults(
        persistence: Arc<dyn PlHistoryApi>,
        ticks: Arc<dyn TickSource>,
        hours: Arc<dyn MarketHours>,
    ) -> Self {
        Self::new(
            persistence,
            ticks,
            hours,
            Duration::from_millis(SNAPSHOT_INTERVAL_MS),
        )
    }

    /// Start tracking a strategy: one immediate snapshot, then one
    /// recurring timer.
    ///
    /// Idempotent: a second call for an already-tracked id is a logged
    /// no-op returning false, leaving the existing timer untouched.
    pub async fn start_tracking(&self, strategy_id: i64, data: M::Data) -> bool {
        let cancel = CancellationToken::new();
        let data = Arc::new(RwLock::new(data));
        let gate = Arc::new(tokio::sync::Mutex::new(()));

        match self.entities.entry(strategy_id) {
            Entry::Occupied(_) => {
                debug!(
                    strategy_id,
                    strategy_type = %M::STRATEGY_TYPE,
                    "Already tracked, start_tracking is a no-op"
                );
                return false;
            }
            Entry::Vacant(slot) => {
                slot.insert(TrackedEntity {
                    data: Arc::clone(&data),
                    snapshot_gate: Arc::clone(&gate),
                    last_update: Utc::now(),
                    cancel: cancel.clone(),
                });
            }
        }

        let cycle = SnapshotCycle::<M> {
            persistence: Arc::clone(&self.persistence),
            ticks: Arc::clone(&self.ticks),
            hours: Arc::clone(&self.hours),
            data,
            gate,
        };

        // Immediate first snapshot, then the timer takes over.
        cycle.run(strategy_id).await;

        let period = self.snapshot_interval;
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => cycle.run(strategy_id).await,
                }
            }
            debug!(strategy_id, "Tracking timer stopped");
        });

        info!(
            strategy_id,
            strategy_type = %M::STRATEGY_TYPE,
            period_ms = self.snapshot_interval.as_millis() as u64,
            "Started tracking"
        );
        true
    }

    /// Stop tracking a strategy: cancel its timer and drop the entry.
    ///
    /// No new snapshot cycle begins after this returns. A persistence
    /// write already issued is NOT aborted; a caller must not assume zero
    /// writes strictly after return (accepted race).
    pub fn stop_tracking(&self, strategy_id: i64) -> bool {
        match self.entities.remove(&strategy_id) {
            Some((_, entity)) => {
                entity.cancel.cancel();
                info!(strategy_id, strategy_type = %M::STRATEGY_TYPE, "Stopped tracking");
                true
            }
            None => {
                debug!(strategy_id, "Not tracked, stop_tracking is a no-op");
                false
            }
        }
    }

    /// Replace the strategy data without touching the timer. No-op if the
    /// strategy is not tracked.
    pub fn update_entity_data(&self, strategy_id: i64, data: M::Data) -> bool {
        match self.entities.get_mut(&strategy_id) {
            Some(mut entity) => {
                *entity.data.write() = data;
                entity.last_update = Utc::now();
                debug!(strategy_id, "Strategy data updated");
                true
            }
            None => {
                debug!(strategy_id, "Not tracked, update_entity_data is a no-op");
                false
            }
        }
    }

    /// Compute one snapshot for a strategy and send it to persistence.
    /// No-op for an untracked id.
    pub async fn calculate_and_save(&self, strategy_id: i64) {
        // Clone the handles out; DashMap guards must not live across await.
        let cycle = self.entities.get(&strategy_id).map(|e| SnapshotCycle::<M> {
            persistence: Arc::clone(&self.persistence),
            ticks: Arc::clone(&self.ticks),
            hours: Arc::clone(&self.hours),
            data: Arc::clone(&e.data),
            gate: Arc::clone(&e.snapshot_gate),
        });
        let Some(cycle) = cycle else {
            trace!(strategy_id, "Not tracked, skipping snapshot");
            return;
        };

        cycle.run(strategy_id).await;
    }

    /// Run one snapshot cycle for every tracked strategy and await the
    /// batch. No ordering between strategies.
    pub async fn force_save_all(&self) {
        let ids: Vec<i64> = self.entities.iter().map(|e| *e.key()).collect();
        debug!(count = ids.len(), "Forcing snapshot for all tracked strategies");
        futures_util::future::join_all(ids.into_iter().map(|id| self.calculate_and_save(id)))
            .await;
    }

    /// Read-only view of the tracked set.
    #[must_use]
    pub fn get_tracking_status(&self) -> TrackingStatus {
        let strategy_ids: Vec<i64> = self.entities.iter().map(|e| *e.key()).collect();
        TrackingStatus {
            total_strategies: strategy_ids.len(),
            strategy_ids,
        }
    }

    /// Last data-update time for a tracked strategy.
    #[must_use]
    pub fn last_update(&self, strategy_id: i64) -> Option<DateTime<Utc>> {
        self.entities.get(&strategy_id).map(|e| e.last_update)
    }

    /// Cancel all timers. Called on shutdown; also runs on drop.
    pub fn stop_all(&self) {
        for entity in self.entities.iter() {
            entity.cancel.cancel();
        }
        self.entities.clear();
    }
}

impl<M: PlModel> Drop for TrackingScheduler<M> {
    fn drop(&mut self) {
        for entity in self.entities.iter() {
            entity.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tickmon_api::{ApiResult, HistoryQuery, PlRecord};
    use tickmon_core::{
        AlgoStrategyData, InstrumentToken, RegularStrategyData, StrategyLeg, Subscription,
    };

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct RecordingPersistence {
        saves: parking_lot::Mutex<Vec<PlSnapshot>>,
    }

    impl RecordingPersistence {
        fn save_count(&self) -> usize {
            self.saves.lock().len()
        }
    }

    #[async_trait]
    impl PlHistoryApi for RecordingPersistence {
        async fn save_snapshot(&self, snapshot: &PlSnapshot) -> ApiResult<()> {
            self.saves.lock().push(snapshot.clone());
            Ok(())
        }

        async fn fetch_history(
            &self,
            _strategy_id: i64,
            _query: &HistoryQuery,
        ) -> ApiResult<Vec<PlRecord>> {
            Ok(Vec::new())
        }
    }

    struct StubTicks(HashMap<InstrumentToken, Subscription>);

    impl TickSource for StubTicks {
        fn tick(&self, token: &InstrumentToken) -> Option<Subscription> {
            self.0.get(token).cloned()
        }
    }

    struct StubHours(AtomicBool);

    impl StubHours {
        fn open(open: bool) -> Arc<Self> {
            Arc::new(Self(AtomicBool::new(open)))
        }
    }

    impl MarketHours for StubHours {
        fn is_open(&self) -> bool {
            self.0.load(Ordering::Acquire)
        }
    }

    fn ticks_with_ltp(token: &str, ltp: rust_decimal::Decimal) -> Arc<StubTicks> {
        let token = InstrumentToken::from(token);
        let sub = Subscription {
            ltp: Some(ltp),
            ..Subscription::new(token.clone())
        };
        Arc::new(StubTicks(HashMap::from([(token, sub)])))
    }

    fn algo_data(token: &str) -> AlgoStrategyData {
        AlgoStrategyData {
            legs: Some(vec![StrategyLeg {
                instrument_token: InstrumentToken::from(token),
                quantity: dec!(10),
                price: dec!(100),
            }]),
        }
    }

    fn regular_data() -> RegularStrategyData {
        RegularStrategyData {
            realized_pl: dec!(100),
            unrealized_pl: dec!(20),
            expenses: dec!(5),
            spot_price: Some(dec!(18000)),
        }
    }

    fn algo_tracker(
        persistence: &Arc<RecordingPersistence>,
        open: bool,
    ) -> Arc<AlgoTracker> {
        Arc::new(AlgoTracker::with_defaults(
            Arc::clone(persistence) as Arc<dyn PlHistoryApi>,
            ticks_with_ltp("1", dec!(110)),
            StubHours::open(open),
        ))
    }

    fn regular_tracker(
        persistence: &Arc<RecordingPersistence>,
        open: bool,
    ) -> Arc<RegularTracker> {
        Arc::new(RegularTracker::with_defaults(
            Arc::clone(persistence) as Arc<dyn PlHistoryApi>,
            Arc::new(StubTicks(HashMap::new())),
            StubHours::open(open),
        ))
    }

    // ------------------------------------------------------------------
    // start/stop lifecycle
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_start_tracking_is_idempotent() {
        let persistence = Arc::new(RecordingPersistence::default());
        let tracker = algo_tracker(&persistence, true);

        assert!(tracker.start_tracking(42, algo_data("1")).await);
        assert!(!tracker.start_tracking(42, algo_data("1")).await);

        let status = tracker.get_tracking_status();
        assert_eq!(status.total_strategies, 1);
        assert_eq!(status.strategy_ids, vec![42]);

        // One immediate snapshot, not two.
        assert_eq!(persistence.save_count(), 1);
    }

    #[tokio::test]
    async fn test_restart_produces_fresh_immediate_snapshot() {
        let persistence = Arc::new(RecordingPersistence::default());
        let tracker = algo_tracker(&persistence, true);

        tracker.start_tracking(42, algo_data("1")).await;
        assert_eq!(persistence.save_count(), 1);

        assert!(tracker.stop_tracking(42));
        assert!(tracker.start_tracking(42, algo_data("1")).await);

        // Exactly one more save at restart time, independent of the timer.
        assert_eq!(persistence.save_count(), 2);
    }

    #[tokio::test]
    async fn test_stop_tracking_untracked_is_noop() {
        let persistence = Arc::new(RecordingPersistence::default());
        let tracker = algo_tracker(&persistence, true);
        assert!(!tracker.stop_tracking(7));
    }

    // ------------------------------------------------------------------
    // Market-hours gating asymmetry
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_algo_skips_persistence_when_market_closed() {
        let persistence = Arc::new(RecordingPersistence::default());
        let tracker = algo_tracker(&persistence, false);

        tracker.start_tracking(42, algo_data("1")).await;
        tracker.calculate_and_save(42).await;
        tracker.calculate_and_save(42).await;

        assert_eq!(persistence.save_count(), 0);
    }

    #[tokio::test]
    async fn test_regular_persists_regardless_of_market_state() {
        let persistence = Arc::new(RecordingPersistence::default());
        let tracker = regular_tracker(&persistence, false);

        tracker.start_tracking(7, regular_data()).await;
        tracker.calculate_and_save(7).await;
        tracker.calculate_and_save(7).await;

        // Immediate save + two manual cycles, market closed throughout.
        assert_eq!(persistence.save_count(), 3);
        let saves = persistence.saves.lock();
        assert!(saves.iter().all(|s| !s.market_hours));
        assert!(saves.iter().all(|s| s.strategy_type == StrategyType::Regular));
        assert!(saves.iter().all(|s| s.total_pl == dec!(115)));
    }

    #[tokio::test]
    async fn test_algo_snapshot_figures_and_flag() {
        let persistence = Arc::new(RecordingPersistence::default());
        let tracker = algo_tracker(&persistence, true);

        tracker.start_tracking(42, algo_data("1")).await;

        let saves = persistence.saves.lock();
        assert_eq!(saves.len(), 1);
        let snapshot = &saves[0];
        assert_eq!(snapshot.strategy_id, 42);
        assert_eq!(snapshot.strategy_type, StrategyType::Algo);
        assert_eq!(snapshot.total_pl, dec!(100));
        assert_eq!(snapshot.market_price, Some(dec!(110)));
        assert!(snapshot.market_hours);
    }

    // ------------------------------------------------------------------
    // Data updates
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_update_entity_data_swaps_without_new_snapshot() {
        let persistence = Arc::new(RecordingPersistence::default());
        let tracker = regular_tracker(&persistence, true);

        tracker.start_tracking(7, regular_data()).await;
        assert_eq!(persistence.save_count(), 1);

        let updated = RegularStrategyData {
            realized_pl: dec!(500),
            ..regular_data()
        };
        assert!(tracker.update_entity_data(7, updated));

        // The swap itself does not snapshot...
        assert_eq!(persistence.save_count(), 1);

        // ...but the next cycle computes from the new data.
        tracker.calculate_and_save(7).await;
        let saves = persistence.saves.lock();
        assert_eq!(saves.last().unwrap().total_pl, dec!(515));
    }

    #[tokio::test]
    async fn test_update_entity_data_untracked_is_noop() {
        let persistence = Arc::new(RecordingPersistence::default());
        let tracker = regular_tracker(&persistence, true);
        assert!(!tracker.update_entity_data(99, regular_data()));
    }

    // ------------------------------------------------------------------
    // Batch save and status
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_force_save_all_issues_one_attempt_per_entity() {
        let persistence = Arc::new(RecordingPersistence::default());
        let tracker = regular_tracker(&persistence, true);

        for id in 1..=4 {
            tracker.start_tracking(id, regular_data()).await;
        }
        let after_starts = persistence.save_count();
        assert_eq!(after_starts, 4);

        tracker.force_save_all().await;
        assert_eq!(persistence.save_count(), after_starts + 4);
    }

    #[tokio::test]
    async fn test_algo_without_leg_list_never_persists() {
        let persistence = Arc::new(RecordingPersistence::default());
        let tracker = algo_tracker(&persistence, true);

        tracker
            .start_tracking(42, AlgoStrategyData { legs: None })
            .await;
        tracker.calculate_and_save(42).await;

        assert_eq!(persistence.save_count(), 0);
        // Tracking itself is active; only the snapshots are skipped.
        assert_eq!(tracker.get_tracking_status().total_strategies, 1);
    }

    #[tokio::test]
    async fn test_tracking_status_empty() {
        let persistence = Arc::new(RecordingPersistence::default());
        let tracker = algo_tracker(&persistence, true);
        let status = tracker.get_tracking_status();
        assert_eq!(status.total_strategies, 0);
        assert!(status.strategy_ids.is_empty());
    }
}
