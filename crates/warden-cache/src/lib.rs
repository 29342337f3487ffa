//! # Warden Cache - Principal Metadata Cache
//!
//! In-memory cache for short-lived per-principal metadata. Entries carry the
//! timestamp they were stored at and are served only while younger than the
//! configured TTL; a periodic background sweep evicts stale entries so the map
//! does not grow unbounded between reads.
//!
//! Freshness is enforced on every `get` regardless of sweep timing: a stale
//! entry that has not been swept yet is still a miss.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// A cached value with its storage timestamp
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// In-memory TTL cache keyed by principal identifier
pub struct PrincipalCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl<V: Clone> PrincipalCache<V> {
    /// Create a new cache with the given time-to-live
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Get the cached value for a principal
    ///
    /// Returns `None` when the entry is absent or older than the TTL. Stale
    /// entries are left in place for the sweep to remove.
    pub async fn get(&self, principal_id: &str) -> Option<V> {
        let entries = self.entries.read().await;

        match entries.get(principal_id) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store or overwrite the value for a principal, stamping the current time
    pub async fn insert(&self, principal_id: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };

        self.entries.write().await.insert(principal_id.into(), entry);
    }

    /// Remove a single entry if present
    pub async fn invalidate(&self, principal_id: &str) {
        let removed = self.entries.write().await.remove(principal_id).is_some();
        if removed {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(principal_id = %principal_id, "Metadata cache entry invalidated");
        }
    }

    /// Clear every entry
    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        drop(entries);

        if count > 0 {
            self.invalidations.fetch_add(count as u64, Ordering::Relaxed);
        }
        tracing::debug!(evicted = count, "Metadata cache cleared");
    }

    /// Remove every entry whose age exceeds the TTL
    ///
    /// Returns the number of evicted entries.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        let evicted = before - entries.len();
        drop(entries);

        if evicted > 0 {
            tracing::debug!(evicted = evicted, "Metadata cache sweep evicted stale entries");
        }

        evicted
    }

    /// Number of physically present entries, stale ones included
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            hit_rate,
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Spawn a background task sweeping the cache at a fixed interval
///
/// The task holds only a weak handle and exits once the cache is dropped.
pub fn spawn_sweeper<V>(cache: &Arc<PrincipalCache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    let weak = Arc::downgrade(cache);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so the initial sweep
        // happens one full interval after startup.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(cache) = weak.upgrade() else {
                break;
            };
            cache.sweep().await;
        }
    })
}

/// Cache statistics snapshot
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub invalidations: u64,
}
