//! Main application orchestration.
//!
//! Wires the long-lived services together:
//! - Market clock broadcasting open/closed state
//! - Subscription registry polling live data while the market is open
//! - Algo and regular tracking schedulers persisting P/L snapshots

use crate::config::AppConfig;
use crate::error::AppResult;
use std::sync::Arc;
use std::time::Duration;
use tickmon_api::{DashboardClient, PlHistoryApi, TickerApi};
use tickmon_clock::MarketClock;
use tickmon_core::{MarketHours, TickSource};
use tickmon_registry::SubscriptionRegistry;
use tickmon_tracker::{AlgoTracker, RegularTracker};
use tracing::info;

/// Main application.
pub struct Application {
    clock: Arc<MarketClock>,
    registry: Arc<SubscriptionRegistry>,
    algo_tracker: Arc<AlgoTracker>,
    regular_tracker: Arc<RegularTracker>,
}

impl Application {
    /// Create a new application from configuration.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let client = Arc::new(DashboardClient::new(&config.api.base_url)?);

        let clock = Arc::new(MarketClock::new(Duration::from_millis(
            config.clock.poll_interval_ms,
        )));

        let registry = Arc::new(SubscriptionRegistry::new(
            Arc::clone(&client) as Arc<dyn TickerApi>,
            Duration::from_millis(config.registry.poll_interval_ms),
            Duration::from_millis(config.registry.status_throttle_ms),
        ));

        let snapshot_interval = Duration::from_millis(config.tracking.snapshot_interval_ms);
        let algo_tracker = Arc::new(AlgoTracker::new(
            Arc::clone(&client) as Arc<dyn PlHistoryApi>,
            Arc::clone(&registry) as Arc<dyn TickSource>,
            Arc::clone(&clock) as Arc<dyn MarketHours>,
            snapshot_interval,
        ));
        let regular_tracker = Arc::new(RegularTracker::new(
            Arc::clone(&client) as Arc<dyn PlHistoryApi>,
            Arc::clone(&registry) as Arc<dyn TickSource>,
            Arc::clone(&clock) as Arc<dyn MarketHours>,
            snapshot_interval,
        ));

        Ok(Self {
            clock,
            registry,
            algo_tracker,
            regular_tracker,
        })
    }

    /// Scheduler for algo strategies, for callers registering strategies.
    #[must_use]
    pub fn algo_tracker(&self) -> &Arc<AlgoTracker> {
        &self.algo_tracker
    }

    /// Scheduler for regular strategies.
    #[must_use]
    pub fn regular_tracker(&self) -> &Arc<RegularTracker> {
        &self.regular_tracker
    }

    /// Registry handle, for callers managing subscriptions directly.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Run until interrupted, then shut down in dependency order.
    pub async fn run(&self) -> AppResult<()> {
        info!("Starting background tracking services");

        self.clock.start_polling();
        self.registry.set_polling(true);
        self.registry.connect().await;

        let market_loop = Arc::clone(&self.registry).spawn_market_loop(self.clock.subscribe());

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");

        // Final snapshots before the timers go away.
        self.algo_tracker.force_save_all().await;
        self.regular_tracker.force_save_all().await;

        self.algo_tracker.stop_all();
        self.regular_tracker.stop_all();
        self.registry.set_polling(false);
        self.registry.disconnect().await;
        self.clock.stop_polling();
        market_loop.abort();

        info!("Shutdown complete");
        Ok(())
    }
}
