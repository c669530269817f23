//! Sliding-window rate limiting.
//!
//! The Riot API enforces an application budget and a per-method budget on
//! every routing value (platform region or continent) at the same time.
//! Each budget is modelled as one [`RateLimiter`]; the
//! [`RateLimiterRegistry`] hands out the right combination for a request.
//!
//! A limiter admits a request while fewer than `max_requests` timestamps are
//! inside the trailing window. Excess callers queue in FIFO order and are
//! released by [`RateLimiter::sweep`], which runs on every `acquire` and
//! periodically from the task started by [`RateLimiter::spawn_sweeper`].

mod registry;

pub use registry::{quota_routes, RateLimitConfig, RateLimiterRegistry, WindowLimit};

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

/// Time source for limiters, injectable for deterministic tests.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: std::sync::Mutex<Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: std::sync::Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}

/// Point-in-time view of a limiter, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSnapshot {
    /// Reservations still inside the window.
    pub active: usize,
    /// Callers waiting for capacity.
    pub queued: usize,
}

#[derive(Default)]
struct LimiterState {
    timestamps: VecDeque<Instant>,
    pending: VecDeque<oneshot::Sender<()>>,
}

impl LimiterState {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Hand free slots to queued callers, oldest first.
    fn grant_pending(&mut self, now: Instant, max_requests: usize) -> usize {
        let mut granted = 0;
        while self.timestamps.len() < max_requests {
            let Some(waiter) = self.pending.pop_front() else {
                break;
            };
            self.timestamps.push_back(now);
            if waiter.send(()).is_err() {
                // Caller went away; give the slot back.
                self.timestamps.pop_back();
            } else {
                granted += 1;
            }
        }
        granted
    }
}

/// Sliding-window limiter with a FIFO wait queue.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter on the system clock.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self::with_clock(max_requests, window, Arc::new(SystemClock))
    }

    /// Create a limiter on an explicit clock.
    pub fn with_clock(max_requests: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            clock,
            state: Mutex::new(LimiterState::default()),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until the window has room, then reserve a slot.
    ///
    /// Queued callers are served before new ones; there is no timeout.
    pub async fn acquire(&self) {
        let waiter = {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            state.prune(now, self.window);
            state.grant_pending(now, self.max_requests);

            if state.pending.is_empty() && state.timestamps.len() < self.max_requests {
                state.timestamps.push_back(now);
                return;
            }

            let (tx, rx) = oneshot::channel();
            state.pending.push_back(tx);
            trace!(queued = state.pending.len(), "rate limiter at capacity");
            rx
        };

        // An error here means the limiter itself was dropped.
        let _ = waiter.await;
    }

    /// Drop expired timestamps and release queued callers that now fit.
    ///
    /// Returns the number of callers released.
    pub async fn sweep(&self) -> usize {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        state.prune(now, self.window);
        state.grant_pending(now, self.max_requests)
    }

    pub async fn snapshot(&self) -> LimiterSnapshot {
        let mut state = self.state.lock().await;
        state.prune(self.clock.now(), self.window);
        LimiterSnapshot {
            active: state.timestamps.len(),
            queued: state.pending.len(),
        }
    }

    /// Sweep every `window / 2` until the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::downgrade(self);
        let period = (self.window / 2).max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                limiter.sweep().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    fn limiter(max: usize, window_ms: u64) -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new());
        let limiter =
            RateLimiter::with_clock(max, Duration::from_millis(window_ms), clock.clone());
        (clock, limiter)
    }

    #[tokio::test]
    async fn test_admits_up_to_capacity() {
        let (_clock, limiter) = limiter(3, 1000);

        for _ in 0..3 {
            limiter.acquire().await;
        }

        let snap = limiter.snapshot().await;
        assert_eq!(snap.active, 3);
        assert_eq!(snap.queued, 0);
    }

    #[tokio::test]
    async fn test_extra_call_waits_for_earliest_expiry() {
        let (clock, limiter) = limiter(2, 1000);

        limiter.acquire().await;
        clock.advance(Duration::from_millis(300));
        limiter.acquire().await;

        let mut third = task::spawn(limiter.acquire());
        assert_pending!(third.poll());

        // Earliest reservation is 900ms old: still inside the window.
        clock.advance(Duration::from_millis(600));
        assert_eq!(limiter.sweep().await, 0);
        assert_pending!(third.poll());

        clock.advance(Duration::from_millis(100));
        assert_eq!(limiter.sweep().await, 1);
        assert!(third.is_woken());
        assert_ready!(third.poll());

        let snap = limiter.snapshot().await;
        assert_eq!(snap.active, 2);
        assert_eq!(snap.queued, 0);
    }

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let (clock, limiter) = limiter(1, 1000);
        limiter.acquire().await;

        let mut first = task::spawn(limiter.acquire());
        let mut second = task::spawn(limiter.acquire());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        clock.advance(Duration::from_millis(1000));
        assert_eq!(limiter.sweep().await, 1);
        assert_ready!(first.poll());
        assert_pending!(second.poll());

        clock.advance(Duration::from_millis(1000));
        assert_eq!(limiter.sweep().await, 1);
        assert_ready!(second.poll());
    }

    #[tokio::test]
    async fn test_new_caller_does_not_overtake_queue() {
        let (clock, limiter) = limiter(1, 1000);
        limiter.acquire().await;

        let mut queued = task::spawn(limiter.acquire());
        assert_pending!(queued.poll());

        // Capacity frees but no sweep has run yet; the newcomer's acquire
        // must serve the queued caller first and then wait itself.
        clock.advance(Duration::from_millis(1000));
        let mut newcomer = task::spawn(limiter.acquire());
        assert_pending!(newcomer.poll());
        assert_ready!(queued.poll());
    }

    #[tokio::test]
    async fn test_dropped_waiter_releases_slot() {
        let (clock, limiter) = limiter(1, 1000);
        limiter.acquire().await;

        let mut abandoned = task::spawn(limiter.acquire());
        assert_pending!(abandoned.poll());
        drop(abandoned);

        clock.advance(Duration::from_millis(1000));
        assert_eq!(limiter.sweep().await, 0);
        assert_eq!(limiter.snapshot().await.active, 0);
    }

    #[tokio::test]
    async fn test_spawned_sweeper_releases_waiter() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_millis(40)));
        let sweeper = limiter.spawn_sweeper();

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));

        sweeper.abort();
    }
}
