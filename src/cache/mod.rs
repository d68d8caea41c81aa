#[cfg(test)]
mod tests;

use std::{collections::HashMap, future::Future, time::Duration};

use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// In-process memoization of expensive lookups, bounded by a TTL and a
/// capacity with oldest-insertion eviction.
///
/// An entry is visible only while it is fresher than the TTL; an expired
/// entry is logically absent even while still stored, and gets replaced on
/// the next miss.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<V: Clone> TtlCache<V> {
    /// Creates an empty cache holding at most `max_entries` values, each
    /// fresh for `ttl`.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl, max_entries }
    }

    /// Returns the cached value for `key` while it is fresh, otherwise runs
    /// `compute`, stores its result and returns it. Failed computes are not
    /// cached.
    ///
    /// The lock is released while `compute` runs, so two concurrent misses
    /// on the same key may both compute and the later insert wins. There is
    /// no stampede protection.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(key) {
                if entry.inserted_at.elapsed() < self.ttl {
                    debug!("Cache hit for {key}");
                    return Ok(entry.value.clone());
                }
            }
        }

        let value = compute().await?;

        let mut entries = self.entries.lock().await;
        entries.insert(key.to_owned(), Entry { value: value.clone(), inserted_at: Instant::now() });
        if entries.len() > self.max_entries {
            let oldest =
                entries.iter().min_by_key(|(_, entry)| entry.inserted_at).map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                debug!("Evicting oldest cache entry: {oldest}");
                entries.remove(&oldest);
            }
        }
        Ok(value)
    }

    /// Drops every entry, fresh or expired. Used when a source of truth
    /// changes out-of-band.
    pub async fn invalidate_all(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of physically stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache holds no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
