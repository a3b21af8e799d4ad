/// TTL policy for the market cache
///
/// Each class of market data stales at a different rate, so each gets its
/// own TTL rather than one global knob.
use crate::config::CacheSettings;
use std::time::Duration;

/// Per-data-class TTLs, derived from configuration
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub quote_ttl: Duration,
    pub historical_ttl: Duration,
    pub news_ttl: Duration,
    pub sentiment_ttl: Duration,
    pub dataset_ttl: Duration,
}

impl CachePolicy {
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            quote_ttl: Duration::from_secs(settings.quote_ttl_secs),
            historical_ttl: Duration::from_secs(settings.historical_ttl_secs),
            news_ttl: Duration::from_secs(settings.news_ttl_secs),
            sentiment_ttl: Duration::from_secs(settings.sentiment_ttl_secs),
            dataset_ttl: Duration::from_secs(settings.dataset_ttl_secs),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_settings(&CacheSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttls_match_settings() {
        let policy = CachePolicy::default();
        assert_eq!(policy.quote_ttl, Duration::from_secs(60));
        assert_eq!(policy.historical_ttl, Duration::from_secs(3600));
        assert_eq!(policy.news_ttl, Duration::from_secs(600));
        assert_eq!(policy.sentiment_ttl, Duration::from_secs(7200));
        assert_eq!(policy.dataset_ttl, Duration::from_secs(1800));
    }
}
