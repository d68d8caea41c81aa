#[cfg(test)]
mod tests;

use std::{fmt::Display, future::Future, time::Duration};

use tracing::{error, warn};

/// Classification of a failure for retry purposes.
///
/// Implemented by each client error type so the policy stays ignorant of any
/// concrete failure taxonomy. Transient failures (timeouts, 5xx, connection
/// resets, remote rate limits) answer `true`; authentication and
/// malformed-request failures answer `false` and propagate immediately.
pub trait Retryable {
    /// Whether another attempt may mask this failure.
    fn is_retryable(&self) -> bool;
}

/// Retry configuration for a wrapped operation. Stateless, cloned per call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of invocations, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after every retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_delay: Duration::from_secs(1), backoff_multiplier: 2.0 }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least one
    /// invocation.
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self { max_attempts: max_attempts.max(1), initial_delay, backoff_multiplier }
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` invocations have been made. The final failure is
    /// propagated unchanged; the sleep between attempts is a suspension
    /// point, not a thread block.
    pub async fn execute<T, E, F, Fut>(&self, op_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => {
                    warn!("Non-retryable failure in {op_name}: {err}");
                    return Err(err);
                }
                Err(err) if attempt >= self.max_attempts => {
                    error!("{op_name} failed after {} attempts: {err}", self.max_attempts);
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        "Attempt {attempt}/{} failed for {op_name}: {err}. Retrying in {:.2}s...",
                        self.max_attempts,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.mul_f64(self.backoff_multiplier);
                    attempt += 1;
                }
            }
        }
    }
}
