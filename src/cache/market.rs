/// Typed facade over the generic TTL cache for market data
///
/// Values are stored as JSON so one cache holds every data class; this
/// module owns the key scheme and the per-class TTLs so callers never
/// touch either directly. Keys embed the symbol, which is what makes
/// `invalidate_symbol` work with a plain substring match.
use crate::cache::{CacheMetrics, CachePolicy, TtlCache};
use crate::logger::{self, LogTag};
use crate::types::{DatasetRecord, FinancialReport, NewsArticle, PriceBar, Quote};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub struct MarketCache {
    inner: TtlCache<serde_json::Value>,
    policy: CachePolicy,
}

impl MarketCache {
    pub fn new(max_entries: usize, policy: CachePolicy) -> Self {
        Self {
            inner: TtlCache::new(max_entries),
            policy,
        }
    }

    // Keys

    fn quote_key(symbol: &str) -> String {
        format!("quote_{}", symbol.to_uppercase())
    }

    fn historical_key(symbol: &str, range: &str) -> String {
        format!("historical_{}_{}", symbol.to_uppercase(), range)
    }

    fn news_key(symbol: &str) -> String {
        format!("news_{}", symbol.to_uppercase())
    }

    fn financials_key(symbol: &str, period: &str) -> String {
        format!("financials_{}_{}", symbol.to_uppercase(), period)
    }

    fn dataset_key(dataset: &str) -> String {
        format!("dataset_{}", dataset)
    }

    // Typed accessors

    pub fn get_quote(&self, symbol: &str) -> Option<Quote> {
        self.get_json(&Self::quote_key(symbol))
    }

    pub fn set_quote(&self, quote: &Quote) {
        self.set_json(&Self::quote_key(&quote.symbol), quote, self.policy.quote_ttl);
    }

    pub fn get_historical(&self, symbol: &str, range: &str) -> Option<Vec<PriceBar>> {
        self.get_json(&Self::historical_key(symbol, range))
    }

    pub fn set_historical(&self, symbol: &str, range: &str, bars: &[PriceBar]) {
        self.set_json(
            &Self::historical_key(symbol, range),
            &bars.to_vec(),
            self.policy.historical_ttl,
        );
    }

    pub fn get_news(&self, symbol: &str) -> Option<Vec<NewsArticle>> {
        self.get_json(&Self::news_key(symbol))
    }

    pub fn set_news(&self, symbol: &str, articles: &[NewsArticle]) {
        self.set_json(
            &Self::news_key(symbol),
            &articles.to_vec(),
            self.policy.news_ttl,
        );
    }

    pub fn get_financials(&self, symbol: &str, period: &str) -> Option<FinancialReport> {
        self.get_json(&Self::financials_key(symbol, period))
    }

    pub fn set_financials(&self, symbol: &str, period: &str, report: &FinancialReport) {
        self.set_json(
            &Self::financials_key(symbol, period),
            report,
            self.policy.sentiment_ttl,
        );
    }

    pub fn get_dataset(&self, dataset: &str) -> Option<Vec<DatasetRecord>> {
        self.get_json(&Self::dataset_key(dataset))
    }

    pub fn set_dataset(&self, dataset: &str, records: &[DatasetRecord]) {
        self.set_json(
            &Self::dataset_key(dataset),
            &records.to_vec(),
            self.policy.dataset_ttl,
        );
    }

    // Raw key access for the gateway pipeline, which owns its own key scheme

    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_json(key)
    }

    pub fn set_value<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        self.set_json(key, value, ttl);
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Drop every key containing `pattern`
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        self.inner.invalidate_pattern(pattern)
    }

    /// Drop every cached entry for a symbol, across all data classes
    pub fn invalidate_symbol(&self, symbol: &str) -> usize {
        let removed = self.inner.invalidate_pattern(&format!("_{}", symbol.to_uppercase()));
        if removed > 0 {
            logger::debug(
                LogTag::Cache,
                &format!("Invalidated {} entries for {}", removed, symbol),
            );
        }
        removed
    }

    /// Sweep expired entries
    pub fn cleanup(&self) -> usize {
        self.inner.cleanup()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.inner.metrics()
    }

    // JSON plumbing

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.inner.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(err) => {
                // A shape mismatch means a stale layout; drop it
                logger::warning(
                    LogTag::Cache,
                    &format!("Discarding undecodable entry '{}': {}", key, err),
                );
                self.inner.remove(key);
                None
            }
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(json) => self.inner.set(key, json, ttl),
            Err(err) => {
                logger::warning(
                    LogTag::Cache,
                    &format!("Failed to serialize entry '{}': {}", key, err),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> MarketCache {
        MarketCache::new(100, CachePolicy::default())
    }

    #[test]
    fn quote_roundtrip() {
        let cache = cache();
        let quote = Quote::simple("AAPL", 187.5, 1_000_000);

        cache.set_quote(&quote);
        let cached = cache.get_quote("AAPL").unwrap();
        assert_eq!(cached.symbol, "AAPL");
        assert_eq!(cached.price, 187.5);
    }

    #[test]
    fn symbol_lookup_is_case_insensitive() {
        let cache = cache();
        cache.set_quote(&Quote::simple("MSFT", 410.0, 500));

        assert!(cache.get_quote("msft").is_some());
    }

    #[test]
    fn invalidate_symbol_spans_data_classes() {
        let cache = cache();
        cache.set_quote(&Quote::simple("TSLA", 250.0, 100));
        cache.set_news("TSLA", &[]);
        cache.set_quote(&Quote::simple("AAPL", 187.5, 100));

        assert_eq!(cache.invalidate_symbol("TSLA"), 2);
        assert!(cache.get_quote("TSLA").is_none());
        assert!(cache.get_quote("AAPL").is_some());
    }

    #[test]
    fn historical_keys_include_range() {
        let cache = cache();
        let bars = vec![PriceBar {
            symbol: "AAPL".to_string(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10,
            timestamp: chrono::Utc::now(),
        }];

        cache.set_historical("AAPL", "1mo", &bars);
        assert!(cache.get_historical("AAPL", "1mo").is_some());
        assert!(cache.get_historical("AAPL", "1y").is_none());
    }
}
