use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use tokio::time;

use super::*;

/// Compute function returning a fresh value and counting invocations.
fn counted(calls: &Arc<AtomicU32>) -> impl Future<Output = Result<u32, ()>> {
    let calls = calls.clone();
    async move { Ok(calls.fetch_add(1, Ordering::SeqCst) + 1) }
}

#[tokio::test(start_paused = true)]
async fn test_second_lookup_within_ttl_hits_cache() {
    let cache = TtlCache::new(Duration::from_secs(5), 16);
    let calls = Arc::new(AtomicU32::new(0));

    let first = cache.get_or_compute("fixtures?date=2024-01-01", || counted(&calls)).await;
    time::advance(Duration::from_secs(2)).await;
    let second = cache.get_or_compute("fixtures?date=2024-01-01", || counted(&calls)).await;

    assert_eq!(first.unwrap(), 1);
    assert_eq!(second.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_is_recomputed() {
    let cache = TtlCache::new(Duration::from_secs(5), 16);
    let calls = Arc::new(AtomicU32::new(0));

    let first = cache.get_or_compute("fixtures?date=2024-01-01", || counted(&calls)).await;
    time::advance(Duration::from_secs(6)).await;
    let second = cache.get_or_compute("fixtures?date=2024-01-01", || counted(&calls)).await;

    assert_eq!(first.unwrap(), 1);
    assert_eq!(second.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_distinct_keys_compute_separately() {
    let cache = TtlCache::new(Duration::from_secs(60), 16);
    let calls = Arc::new(AtomicU32::new(0));

    let a = cache.get_or_compute("fixtures?date=2024-01-01", || counted(&calls)).await;
    let b = cache.get_or_compute("fixtures?date=2024-01-02", || counted(&calls)).await;

    assert_ne!(a.unwrap(), b.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_capacity_evicts_single_oldest_insertion() {
    let cache = TtlCache::new(Duration::from_secs(600), 3);
    let calls = Arc::new(AtomicU32::new(0));

    for key in ["a", "b", "c", "d"] {
        let _ = cache.get_or_compute(key, || counted(&calls)).await;
        time::advance(Duration::from_millis(10)).await;
    }
    assert_eq!(cache.len().await, 3);

    // "b", "c" and "d" survive; only the oldest key "a" recomputes.
    for key in ["b", "c", "d"] {
        let _ = cache.get_or_compute(key, || counted(&calls)).await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let _ = cache.get_or_compute("a", || counted(&calls)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_all_clears_fresh_entries() {
    let cache = TtlCache::new(Duration::from_secs(600), 16);
    let calls = Arc::new(AtomicU32::new(0));

    let _ = cache.get_or_compute("a", || counted(&calls)).await;
    cache.invalidate_all().await;
    assert!(cache.is_empty().await);

    let _ = cache.get_or_compute("a", || counted(&calls)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_compute_is_not_cached() {
    let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60), 16);
    let calls = Arc::new(AtomicU32::new(0));

    let failed: Result<u32, &str> = cache
        .get_or_compute("a", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("backend down") }
        })
        .await;
    assert!(failed.is_err());
    assert!(cache.is_empty().await);

    let recovered: Result<u32, &str> = cache
        .get_or_compute("a", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        })
        .await;
    assert_eq!(recovered.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_replacing_expired_entry_keeps_len_stable() {
    let cache = TtlCache::new(Duration::from_secs(5), 16);
    let calls = Arc::new(AtomicU32::new(0));

    let _ = cache.get_or_compute("a", || counted(&calls)).await;
    time::advance(Duration::from_secs(6)).await;
    let _ = cache.get_or_compute("a", || counted(&calls)).await;

    assert_eq!(cache.len().await, 1);
}
