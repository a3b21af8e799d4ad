/// Per-client sliding window rate limiter
///
/// Each identifier keeps the timestamps of its admitted requests; a check
/// prunes entries older than the window, then admits only while the pruned
/// count is under the limit. State is process-local, so limits apply per
/// instance, not across a fleet.
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: usize,
    pub reset_time: DateTime<Utc>,
}

pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: usize,
    requests: Mutex<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject a request for `identifier`
    ///
    /// Admission appends the current instant; rejection leaves the window
    /// untouched so rejected traffic cannot extend its own ban.
    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut requests = self.requests.lock();

        let window = requests.entry(identifier.to_string()).or_default();
        window.retain(|&stamp| now.duration_since(stamp) < self.window);

        let allowed = window.len() < self.max_requests;
        if allowed {
            window.push(now);
        }

        let remaining = self.max_requests.saturating_sub(window.len());
        let reset_time = Utc::now()
            + chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::seconds(60));

        RateLimitDecision {
            allowed,
            remaining,
            reset_time,
        }
    }

    /// Drop identifiers whose windows have fully expired
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut requests = self.requests.lock();
        let before = requests.len();

        requests.retain(|_, window| {
            window.retain(|&stamp| now.duration_since(stamp) < self.window);
            !window.is_empty()
        });

        before - requests.len()
    }

    /// Number of identifiers currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.requests.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 100);

        for i in 0..100 {
            let decision = limiter.check("client");
            assert!(decision.allowed, "request {} should be admitted", i);
        }

        let decision = limiter.check("client");
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn identifiers_are_independent() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 1);

        assert!(limiter.check("a").allowed);
        assert!(!limiter.check("a").allowed);
        assert!(limiter.check("b").allowed);
    }

    #[test]
    fn window_expiry_readmits() {
        let limiter = SlidingWindowLimiter::new(Duration::from_millis(50), 1);

        assert!(limiter.check("client").allowed);
        assert!(!limiter.check("client").allowed);

        std::thread::sleep(Duration::from_millis(80));
        assert!(limiter.check("client").allowed);
    }

    #[test]
    fn cleanup_drops_expired_identifiers() {
        let limiter = SlidingWindowLimiter::new(Duration::from_millis(50), 10);

        limiter.check("stale");
        assert_eq!(limiter.tracked_clients(), 1);

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(limiter.cleanup(), 1);
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn rejections_do_not_extend_the_window() {
        let limiter = SlidingWindowLimiter::new(Duration::from_millis(100), 1);

        assert!(limiter.check("client").allowed);
        for _ in 0..5 {
            assert!(!limiter.check("client").allowed);
        }

        std::thread::sleep(Duration::from_millis(130));
        assert!(limiter.check("client").allowed);
    }
}
