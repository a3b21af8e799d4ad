/// Generic in-memory cache with per-entry TTL and bounded size
///
/// Thread-safe, generic over the value type. Eviction prefers entries with
/// the fewest recorded hits, oldest first on ties - a cheap approximation of
/// LRU+LFU. The O(n) eviction scan is fine at the configured sizes; only the
/// `len() <= max_entries` bound is contractual.
///
/// Tracks metrics for monitoring.
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cache entry with TTL and hit tracking
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
    hits: u64,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
            hits: 0,
        }
    }

    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub inserts: u64,
    pub invalidations: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded TTL cache keyed by string
pub struct TtlCache<V>
where
    V: Clone,
{
    max_entries: usize,
    data: RwLock<HashMap<String, CacheEntry<V>>>,
    metrics: RwLock<CacheMetrics>,
}

impl<V> TtlCache<V>
where
    V: Clone,
{
    /// Create a cache holding at most `max_entries` values
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            data: RwLock::new(HashMap::new()),
            metrics: RwLock::new(CacheMetrics::default()),
        }
    }

    /// Get a value; expired entries are removed and count as misses
    pub fn get(&self, key: &str) -> Option<V> {
        let mut data = self.data.write();

        if let Some(entry) = data.get_mut(key) {
            if entry.is_expired() {
                data.remove(key);

                let mut metrics = self.metrics.write();
                metrics.misses += 1;
                metrics.expirations += 1;
                return None;
            }

            entry.hits += 1;
            self.metrics.write().hits += 1;
            Some(entry.value.clone())
        } else {
            self.metrics.write().misses += 1;
            None
        }
    }

    /// Insert or overwrite a value with its own TTL
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let mut data = self.data.write();

        if data.len() >= self.max_entries && !data.contains_key(key) {
            self.evict_one(&mut data);
        }

        data.insert(key.to_string(), CacheEntry::new(value, ttl));
        self.metrics.write().inserts += 1;
    }

    /// Remove a specific key
    pub fn remove(&self, key: &str) -> bool {
        self.data.write().remove(key).is_some()
    }

    /// Delete every key containing `pattern`; returns how many were removed
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|key, _| !key.contains(pattern));
        let removed = before - data.len();

        self.metrics.write().invalidations += removed as u64;
        removed
    }

    /// Sweep expired entries; returns how many were removed
    ///
    /// Runs periodically from the maintenance service so memory stays bounded
    /// even under read-only traffic that never touches stale keys.
    pub fn cleanup(&self) -> usize {
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired());
        let removed = before - data.len();

        self.metrics.write().expirations += removed as u64;
        removed
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.data.write().clear();
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of current metrics
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.read().clone()
    }

    // Evict the entry with the fewest hits, oldest on ties
    fn evict_one(&self, data: &mut HashMap<String, CacheEntry<V>>) {
        let victim = data
            .iter()
            .min_by_key(|(_, entry)| (entry.hits, entry.stored_at))
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            data.remove(&key);
            self.metrics.write().evictions += 1;
        }
    }
}
