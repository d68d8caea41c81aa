
use std::time::Duration;

use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};
use tracing::warn;

/// Error returned when a rate limit window has no capacity left.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Rate limit exceeded for the {window} window, capacity frees in {wait:?}")]
pub struct RateLimited {
    /// Name of the window that rejected the call.
    pub window: &'static str,
    /// Time until the window accumulates one token again.
    pub wait: Duration,
}

/// Policy applied by [`RateLimiter::acquire`] when a window is drained.
#[derive(Debug, Clone, Copy)]
pub enum OnExhaustion {
    /// Sleep until capacity frees, as long as the wait fits within
    /// `max_wait`. Longer waits (a drained daily quota) are surfaced
    /// immediately so callers can answer "try again tomorrow" instead of
    /// stalling.
    Block {
        /// The longest wait worth sleeping through.
        max_wait: Duration,
    },
    /// Never sleep, surface the wait time to the caller.
    FailFast,
}

struct Window {
    name: &'static str,
    capacity: u32,
    refill_period: Duration,
    tokens: f64,
    last_refill: Instant,
}

impl Window {
    fn new(name: &'static str, capacity: u32, refill_period: Duration) -> Self {
        // A fresh bucket is full: the first `capacity` calls are admitted.
        Self {
            name,
            capacity,
            refill_period,
            tokens: f64::from(capacity),
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let rate = f64::from(self.capacity) / self.refill_period.as_secs_f64();
        self.tokens = (self.tokens + elapsed.as_secs_f64() * rate).min(f64::from(self.capacity));
        self.last_refill = now;
    }

    fn wait_for_one(&self) -> Duration {
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        let per_token = self.refill_period.as_secs_f64() / f64::from(self.capacity);
        Duration::from_secs_f64((1.0 - self.tokens) * per_token)
    }
}

/// Token-bucket rate limiter enforcing one or more independent time windows.
///
/// Every window must admit a call for it to proceed; a single admitted call
/// consumes one token from each window. Token counts are guarded by one
/// mutex, so overlapping callers see a consistent read-modify-write.
pub struct RateLimiter {
    windows: Mutex<Vec<Window>>,
    on_exhaustion: OnExhaustion,
}

impl RateLimiter {
    /// Creates a limiter with no windows. At least one window must be added
    /// via [`RateLimiter::with_window`] before use.
    pub fn new(on_exhaustion: OnExhaustion) -> Self {
        Self { windows: Mutex::new(Vec::new()), on_exhaustion }
    }

    /// Adds an enforcement window with `capacity` calls per `refill_period`.
    ///
    /// Windows are kept sorted longest period first, so a drained daily
    /// quota is reported ahead of a momentary minute stall.
    pub fn with_window(mut self, name: &'static str, capacity: u32, refill_period: Duration) -> Self {
        let windows = self.windows.get_mut();
        windows.push(Window::new(name, capacity, refill_period));
        windows.sort_by(|a, b| b.refill_period.cmp(&a.refill_period));
        self
    }

    /// Admits the call if every window holds at least one token, consuming
    /// one token from each. Fails without consuming anything otherwise,
    /// reporting the first drained window and the time until it refills.
    pub async fn try_acquire(&self) -> Result<(), RateLimited> {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        for window in windows.iter_mut() {
            window.refill(now);
        }

        if let Some(drained) = windows.iter().find(|w| w.tokens < 1.0) {
            return Err(RateLimited { window: drained.name, wait: drained.wait_for_one() });
        }

        for window in windows.iter_mut() {
            window.tokens -= 1.0;
        }
        Ok(())
    }

    /// Admits the call, applying the configured exhaustion policy while any
    /// window is drained.
    pub async fn acquire(&self) -> Result<(), RateLimited> {
        loop {
            let limited = match self.try_acquire().await {
                Ok(()) => return Ok(()),
                Err(limited) => limited,
            };
            match self.on_exhaustion {
                OnExhaustion::Block { max_wait } if limited.wait <= max_wait => {
                    warn!(
                        "Rate limit reached on the {} window, sleeping for {:.2}s",
                        limited.window,
                        limited.wait.as_secs_f64()
                    );
                    tokio::time::sleep(limited.wait).await;
                }
                _ => return Err(limited),
            }
        }
    }
}
