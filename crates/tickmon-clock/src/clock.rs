//! Market clock: evaluates market hours and broadcasts the result on a
//! fixed cadence.
//!
//! Subscribers receive the current `MarketState` on **every** poll tick,
//! whether or not the value changed since the previous tick. Consumers that
//! need edge-triggered behavior must debounce on their side; the registry
//! deliberately does not (it rebuilds its poll loop on every broadcast).

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tickmon_core::MarketState;

/// Default broadcast cadence: 2 seconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Broadcast channel capacity. State is level-triggered, so a lagged
/// receiver loses nothing it cannot recover on the next tick.
const EVENT_CAPACITY: usize = 16;

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Market-hours broadcaster.
///
/// One shared timer serves all subscribers; `start_polling` is idempotent.
/// Evaluation is pure and cannot fail, so there is no error path.
pub struct MarketClock {
    poll_interval: Duration,
    events: broadcast::Sender<MarketState>,
    poll_task: Mutex<Option<PollTask>>,
}

impl MarketClock {
    /// Create a clock with the given broadcast cadence.
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            poll_interval,
            events,
            poll_task: Mutex::new(None),
        }
    }

    /// Create a clock with the default 2-second cadence.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }

    /// Whether the market is open at this instant.
    #[must_use]
    pub fn is_open(&self) -> bool {
        tickmon_core::is_open_now()
    }

    /// Register a subscriber. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MarketState> {
        self.events.subscribe()
    }

    /// Start the shared poll timer. A second call while polling is a no-op.
    pub fn start_polling(&self) {
        let mut slot = self.poll_task.lock();
        if slot.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("Market clock already polling");
            return;
        }

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let events = self.events.clone();
        let period = self.poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        // Level-triggered: send on every tick, changed or not.
                        let _ = events.send(MarketState::now());
                    }
                }
            }
            debug!("Market clock poll task stopped");
        });

        info!(period_ms = period.as_millis() as u64, "Market clock polling started");
        *slot = Some(PollTask { cancel, handle });
    }

    /// Cancel the poll timer. Future ticks stop; nothing is in flight.
    pub fn stop_polling(&self) {
        if let Some(task) = self.poll_task.lock().take() {
            task.cancel.cancel();
            info!("Market clock polling stopped");
        }
    }

    /// Whether the shared poll timer is currently running.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poll_task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }
}

impl tickmon_core::MarketHours for MarketClock {
    fn is_open(&self) -> bool {
        MarketClock::is_open(self)
    }
}

impl Drop for MarketClock {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.lock().take() {
            task.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_fires_every_tick_without_change() {
        let clock = MarketClock::new(Duration::from_millis(100));
        let mut rx = clock.subscribe();

        clock.start_polling();

        // Three ticks of auto-advanced time; the wall clock is unchanged,
        // so every received state carries the same is_open value.
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();

        assert_eq!(first.is_open, second.is_open);
        assert_eq!(second.is_open, third.is_open);

        clock.stop_polling();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_polling_is_idempotent() {
        let clock = MarketClock::new(Duration::from_millis(100));
        let mut rx = clock.subscribe();

        clock.start_polling();
        clock.start_polling();
        assert!(clock.is_polling());

        // A doubled timer would deliver ~2x events per period; drain for a
        // fixed window and check the count matches a single timer.
        let mut received = 0;
        for _ in 0..4 {
            if rx.recv().await.is_ok() {
                received += 1;
            }
        }
        clock.stop_polling();

        // Exactly the 4 we awaited; no pile-up beyond one event per tick.
        assert_eq!(received, 4);
        let extra = rx.try_recv();
        assert!(matches!(
            extra,
            Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_polling_cancels_future_ticks() {
        let clock = MarketClock::new(Duration::from_millis(100));
        let mut rx = clock.subscribe();

        clock.start_polling();
        let _ = rx.recv().await.unwrap();
        clock.stop_polling();

        // Give the task time to observe cancellation, then drain.
        tokio::time::sleep(Duration::from_millis(350)).await;
        while rx.try_recv().is_ok() {}

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
        assert!(!clock.is_polling());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_share_one_timer() {
        let clock = MarketClock::new(Duration::from_millis(10));
        let mut rx1 = clock.subscribe();
        let mut rx2 = clock.subscribe();

        clock.start_polling();

        let s1 = rx1.recv().await.unwrap();
        let s2 = rx2.recv().await.unwrap();
        assert_eq!(s1, s2);

        clock.stop_polling();
    }
}
