//! Subscription registry: connection state, throttled status checks, and
//! the market-hours gated poll loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tickmon_api::TickerApi;
use tickmon_core::{InstrumentToken, MarketState, Subscription, TickSource, WebhookStatus};

/// Minimum spacing between non-forced remote status reads: 30 seconds.
pub const STATUS_CHECK_THROTTLE_MS: u64 = 30_000;

/// Default poll cadence while the market is open: 2 seconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Broadcast channel capacity for registry snapshots.
const EVENT_CAPACITY: usize = 32;

/// Full registry state published to subscribers on every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySnapshot {
    pub is_connected: bool,
    pub webhook_status: WebhookStatus,
    pub subscriptions: Vec<Subscription>,
}

struct RegistryState {
    is_connected: bool,
    webhook_status: WebhookStatus,
    subscriptions: Vec<Subscription>,
    last_status_check: Option<Instant>,
}

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Connection and subscription state for the live instrument feed.
///
/// Constructed once at application start and shared by reference; polling
/// runs only while `set_polling(true)` has been called AND the market
/// clock broadcasts an open state. None of the public operations propagate
/// errors: remote failures are logged and the state degrades conservatively,
/// so polling paths never surface errors to callers.
pub struct SubscriptionRegistry {
    api: Arc<dyn TickerApi>,
    state: RwLock<RegistryState>,
    events: broadcast::Sender<RegistrySnapshot>,
    poll_interval: Duration,
    status_throttle: Duration,
    is_polling: AtomicBool,
    poll_task: Mutex<Option<PollTask>>,
}

impl SubscriptionRegistry {
    /// Create a registry over a ticker API client.
    #[must_use]
    pub fn new(api: Arc<dyn TickerApi>, poll_interval: Duration, status_throttle: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            state: RwLock::new(RegistryState {
                is_connected: false,
                webhook_status: WebhookStatus::default(),
                subscriptions: Vec::new(),
                last_status_check: None,
            }),
            events,
            poll_interval,
            status_throttle,
            is_polling: AtomicBool::new(false),
            poll_task: Mutex::new(None),
        }
    }

    /// Create a registry with the default cadence and throttle.
    #[must_use]
    pub fn with_defaults(api: Arc<dyn TickerApi>) -> Self {
        Self::new(
            api,
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            Duration::from_millis(STATUS_CHECK_THROTTLE_MS),
        )
    }

    /// Register a subscriber for full-state snapshots.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistrySnapshot> {
        self.events.subscribe()
    }

    /// Current full state.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.read();
        RegistrySnapshot {
            is_connected: state.is_connected,
            webhook_status: state.webhook_status,
            subscriptions: state.subscriptions.clone(),
        }
    }

    fn notify(&self) {
        let _ = self.events.send(self.snapshot());
    }

    // ========================================================================
    // Connection management
    // ========================================================================

    /// Establish the webhook/ticker connection by subscribing the empty
    /// token set. Returns whether the remote call succeeded; on failure
    /// `is_connected` stays false.
    pub async fn connect(&self) -> bool {
        match self.api.subscribe_tokens(&[]).await {
            Ok(()) => {
                self.state.write().is_connected = true;
                self.notify();
                info!("Ticker connection established");
                self.fetch_status(true).await;
                true
            }
            Err(e) => {
                warn!(error = %e, "Ticker connect failed");
                false
            }
        }
    }

    /// Tear down the ticker connection. On failure returns false and the
    /// state is left in whatever partial condition the failed call
    /// produced; there is no rollback.
    pub async fn disconnect(&self) -> bool {
        match self.api.disconnect().await {
            Ok(()) => {
                self.state.write().is_connected = false;
                self.notify();
                info!("Ticker disconnected");
                self.fetch_status(true).await;
                true
            }
            Err(e) => {
                warn!(error = %e, "Ticker disconnect failed");
                false
            }
        }
    }

    // ========================================================================
    // Status and subscription refresh
    // ========================================================================

    /// Refresh the webhook status, throttled to one remote read per
    /// `status_throttle` unless `force` is set. A throttled call is a
    /// silent no-op returning the last known state.
    ///
    /// A failed remote read resets the status to disconnected: failure is
    /// indistinguishable from "definitely disconnected" (known limitation).
    pub async fn fetch_status(&self, force: bool) -> WebhookStatus {
        {
            let mut state = self.state.write();
            if !force {
                let throttled = state
                    .last_status_check
                    .is_some_and(|at| at.elapsed() < self.status_throttle);
                if throttled {
                    return state.webhook_status;
                }
            }
            state.webhook_status.loading = true;
        }
        self.notify();

        let status = match self.api.fetch_status().await {
            Ok(ticker_connected) => {
                debug!(ticker_connected, "Webhook status refreshed");
                let mut state = self.state.write();
                state.webhook_status = WebhookStatus {
                    ticker_connected,
                    loading: false,
                };
                state.is_connected = ticker_connected;
                state.last_status_check = Some(Instant::now());
                state.webhook_status
            }
            Err(e) => {
                warn!(error = %e, "Webhook status check failed");
                let mut state = self.state.write();
                state.webhook_status = WebhookStatus {
                    ticker_connected: false,
                    loading: false,
                };
                state.last_status_check = Some(Instant::now());
                state.webhook_status
            }
        };
        self.notify();

        status
    }

    /// Refresh the subscription list unconditionally. On failure the
    /// previous list is kept and the error logged.
    pub async fn fetch_subscriptions(&self) {
        match self.api.fetch_subscriptions().await {
            Ok(subscriptions) => {
                debug!(count = subscriptions.len(), "Subscriptions refreshed");
                self.state.write().subscriptions = subscriptions;
                self.notify();
            }
            Err(e) => {
                warn!(error = %e, "Subscription refresh failed, keeping previous list");
            }
        }
    }

    /// Subscribe one token and refresh the list.
    pub async fn subscribe_token(&self, token: InstrumentToken) {
        if let Err(e) = self.api.subscribe_tokens(std::slice::from_ref(&token)).await {
            warn!(token = %token, error = %e, "Token subscribe failed");
        }
        self.fetch_subscriptions().await;
    }

    /// Unsubscribe one token and refresh the list.
    pub async fn unsubscribe_token(&self, token: InstrumentToken) {
        if let Err(e) = self
            .api
            .unsubscribe_tokens(std::slice::from_ref(&token))
            .await
        {
            warn!(token = %token, error = %e, "Token unsubscribe failed");
        }
        self.fetch_subscriptions().await;
    }

    // ========================================================================
    // Polling lifecycle
    // ========================================================================

    /// Enable or disable polling. The poll loop itself starts on the next
    /// market clock broadcast (and only while the market is open).
    pub fn set_polling(&self, enabled: bool) {
        self.is_polling.store(enabled, Ordering::Release);
        if !enabled {
            self.teardown_poll_task();
        }
        info!(enabled, "Registry polling flag set");
    }

    /// Whether polling is enabled (independent of market hours).
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.is_polling.load(Ordering::Acquire)
    }

    /// Drive the polling lifecycle from market clock broadcasts.
    ///
    /// Deliberate: the poll interval is torn down and rebuilt on EVERY
    /// broadcast (every 2 s while open), not only on open/close
    /// transitions. The rebuild is one task spawn per broadcast; change
    /// this only with a measured reason.
    pub fn spawn_market_loop(
        self: Arc<Self>,
        mut clock_events: broadcast::Receiver<MarketState>,
    ) -> JoinHandle<()> {
        let registry = self;
        tokio::spawn(async move {
            loop {
                match clock_events.recv().await {
                    Ok(state) => Self::rebuild_poll_task(&registry, state.is_open),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Market clock events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Market clock channel closed, stopping registry polling");
            registry.teardown_poll_task();
        })
    }

    fn rebuild_poll_task(registry: &Arc<Self>, market_open: bool) {
        registry.teardown_poll_task();

        if !(registry.is_polling() && market_open) {
            return;
        }

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let period = registry.poll_interval;
        let task_registry = Arc::clone(registry);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        // Status is throttled internally; the list refresh
                        // is not.
                        task_registry.fetch_status(false).await;
                        task_registry.fetch_subscriptions().await;
                    }
                }
            }
        });

        *registry.poll_task.lock() = Some(PollTask { cancel, handle });
    }

    fn teardown_poll_task(&self) {
        if let Some(task) = self.poll_task.lock().take() {
            task.cancel.cancel();
        }
    }
}

impl TickSource for SubscriptionRegistry {
    fn tick(&self, token: &InstrumentToken) -> Option<Subscription> {
        self.state
            .read()
            .subscriptions
            .iter()
            .find(|s| &s.instrument_token == token)
            .cloned()
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.teardown_poll_task();
    }
}
