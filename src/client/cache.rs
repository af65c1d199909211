//! TTL response cache with LRU eviction and negative caching.
//!
//! Keys are derived by the client (object id, normalized search query,
//! department id). Values carry their own TTL so callers can apply
//! different policies per result class: long for successful objects and
//! search id lists, medium for confirmed not-found, short for empty
//! results. Expiry is lazy: an expired entry counts as a miss and is
//! dropped on the access that discovers it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::models::Artwork;

/// A cacheable upstream outcome.
///
/// `Absent` is the negative-cache sentinel: the upstream definitively has
/// no such record, which is worth remembering just like a hit.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Record(Box<Artwork>),
    Ids(Vec<u64>),
    Absent,
}

#[derive(Debug)]
struct CacheEntry {
    value: CacheValue,
    inserted_at: Instant,
    ttl: Duration,
    last_access: Instant,
    hits: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

/// Cache counters, exposed through the client's diagnostics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub hit_rate: f64,
}

/// Keyed TTL store for upstream responses.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `key` with the given TTL.
    pub async fn set(&self, key: &str, value: CacheValue, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: now,
                ttl,
                last_access: now,
                hits: 0,
            },
        );
    }

    /// Look up `key`, treating an expired entry as absent.
    pub async fn get(&self, key: &str) -> Option<CacheValue> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_access = now;
                entry.hits += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Shrink to at most `max_size` entries.
    ///
    /// Expired entries go first; if the cache is still over the limit the
    /// least-recently-accessed live entries are removed, and nothing more.
    pub async fn evict(&self, max_size: usize) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        entries.retain(|_, entry| !entry.is_expired(now));
        if entries.len() <= max_size {
            return;
        }

        let mut by_recency: Vec<(String, Instant)> = entries
            .iter()
            .map(|(k, e)| (k.clone(), e.last_access))
            .collect();
        by_recency.sort_by_key(|(_, accessed)| *accessed);

        let excess = entries.len() - max_size;
        for (key, _) in by_recency.into_iter().take(excess) {
            entries.remove(&key);
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let size = self.entries.lock().await.len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        CacheStats {
            hits,
            misses,
            size,
            hit_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[u64]) -> CacheValue {
        CacheValue::Ids(v.to_vec())
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get_round_trip() {
        let cache = ResponseCache::new();
        cache.set("k", ids(&[1, 2, 3]), Duration::from_secs(60)).await;

        match cache.get("k").await {
            Some(CacheValue::Ids(v)) => assert_eq!(v, vec![1, 2, 3]),
            other => panic!("unexpected cache result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_a_miss() {
        let cache = ResponseCache::new();
        cache.set("k", ids(&[1]), Duration::from_secs(10)).await;

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.get("k").await.is_none());

        // The expired entry was physically dropped on access.
        let stats = cache.stats().await;
        assert_eq!(stats.size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_result_is_cached() {
        let cache = ResponseCache::new();
        cache.set("object:9", CacheValue::Absent, Duration::from_secs(60)).await;

        assert!(matches!(cache.get("object:9").await, Some(CacheValue::Absent)));
        assert!(cache.has("object:9").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_eviction_keeps_recently_accessed() {
        let cache = ResponseCache::new();
        cache.set("a", ids(&[1]), Duration::from_secs(600)).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.set("b", ids(&[2]), Duration::from_secs(600)).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.set("c", ids(&[3]), Duration::from_secs(600)).await;
        tokio::time::advance(Duration::from_secs(1)).await;

        // Touch "a" so "b" becomes the least recently used.
        cache.get("a").await;
        cache.evict(2).await;

        assert!(cache.has("a").await);
        assert!(cache.has("c").await);
        assert!(!cache.has("b").await);

        // Removes only what is necessary.
        assert_eq!(cache.stats().await.size, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_noop_under_limit() {
        let cache = ResponseCache::new();
        cache.set("a", ids(&[1]), Duration::from_secs(600)).await;
        cache.evict(10).await;
        assert_eq!(cache.stats().await.size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_hit_rate() {
        let cache = ResponseCache::new();
        cache.set("k", ids(&[1]), Duration::from_secs(60)).await;
        cache.get("k").await;
        cache.get("k").await;
        cache.get("missing").await;

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
