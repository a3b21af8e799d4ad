/// Gateway request metrics
///
/// Plain atomic counters so the hot path never takes a lock. Derived rates
/// are computed at snapshot time.
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct GatewayMetrics {
    requests: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    rate_limited: AtomicU64,
    total_latency_ms: AtomicU64,
}

/// Point-in-time copy with derived rates
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rate_limited: u64,
    pub error_rate_pct: f64,
    pub cache_hit_rate_pct: f64,
    pub average_latency_ms: f64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, latency_ms: u64) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let total_latency_ms = self.total_latency_ms.load(Ordering::Relaxed);

        let lookups = cache_hits + cache_misses;

        MetricsSnapshot {
            requests,
            successes,
            errors,
            cache_hits,
            cache_misses,
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            error_rate_pct: if requests > 0 {
                errors as f64 / requests as f64 * 100.0
            } else {
                0.0
            },
            cache_hit_rate_pct: if lookups > 0 {
                cache_hits as f64 / lookups as f64 * 100.0
            } else {
                0.0
            },
            average_latency_ms: if successes > 0 {
                total_latency_ms as f64 / successes as f64
            } else {
                0.0
            },
        }
    }

    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.rate_limited.store(0, Ordering::Relaxed);
        self.total_latency_ms.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_rates() {
        let metrics = GatewayMetrics::new();

        for _ in 0..4 {
            metrics.record_request();
        }
        metrics.record_success(100);
        metrics.record_success(200);
        metrics.record_error();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        let snap = metrics.snapshot();
        assert_eq!(snap.requests, 4);
        assert_eq!(snap.error_rate_pct, 25.0);
        assert_eq!(snap.cache_hit_rate_pct, 75.0);
        assert_eq!(snap.average_latency_ms, 150.0);
    }

    #[test]
    fn zero_activity_yields_zero_rates() {
        let snap = GatewayMetrics::new().snapshot();
        assert_eq!(snap.error_rate_pct, 0.0);
        assert_eq!(snap.cache_hit_rate_pct, 0.0);
        assert_eq!(snap.average_latency_ms, 0.0);
    }

    #[test]
    fn reset_clears_everything() {
        let metrics = GatewayMetrics::new();
        metrics.record_request();
        metrics.record_success(50);
        metrics.record_rate_limited();

        metrics.reset();
        let snap = metrics.snapshot();
        assert_eq!(snap.requests, 0);
        assert_eq!(snap.successes, 0);
        assert_eq!(snap.rate_limited, 0);
    }
}
