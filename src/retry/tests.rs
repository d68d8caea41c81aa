use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use tokio::time::Instant;

use super::*;

#[derive(Debug, thiserror::Error)]
enum TestError {
    #[error("transient failure")]
    Transient,
    #[error("permanent failure")]
    Permanent,
}

impl Retryable for TestError {
    fn is_retryable(&self) -> bool {
        matches!(self, TestError::Transient)
    }
}

/// Operation failing with `failures` transient errors before succeeding.
fn flaky(
    failures: u32,
    calls: Arc<AtomicU32>,
) -> impl FnMut() -> Pin<Box<dyn Future<Output = Result<u32, TestError>> + Send>> {
    move || {
        let calls = calls.clone();
        Box::pin(async move {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= failures { Err(TestError::Transient) } else { Ok(attempt) }
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_after_transient_failures() {
    // Arrange
    let policy = RetryPolicy::default();
    let calls = Arc::new(AtomicU32::new(0));

    // Act
    let result = policy.execute("op", flaky(2, calls.clone())).await;

    // Assert
    assert_eq!(result.unwrap(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhausts_attempts_on_persistent_failure() {
    // Arrange
    let policy = RetryPolicy::new(4, Duration::from_millis(10), 2.0);
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    // Act
    let result: Result<(), TestError> = policy
        .execute("op", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Transient) }
        })
        .await;

    // Assert
    assert!(matches!(result, Err(TestError::Transient)));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_failure_propagates_immediately() {
    // Arrange
    let policy = RetryPolicy::default();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    // Act
    let result: Result<(), TestError> = policy
        .execute("op", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Permanent) }
        })
        .await;

    // Assert
    assert!(matches!(result, Err(TestError::Permanent)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_delays_grow_exponentially() {
    // Two failures with initial delay 1s and multiplier 2.0 sleep a total
    // of 1 + 2 = 3 seconds before the third attempt succeeds.
    let policy = RetryPolicy::new(3, Duration::from_secs(1), 2.0);
    let calls = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    let result = policy.execute("op", flaky(2, calls.clone())).await;

    assert_eq!(result.unwrap(), 3);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_zero_attempts_clamped_to_one() {
    let policy = RetryPolicy::new(0, Duration::from_secs(1), 2.0);
    let calls = Arc::new(AtomicU32::new(0));

    let result = policy.execute("op", flaky(0, calls.clone())).await;

    assert_eq!(result.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
