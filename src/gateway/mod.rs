/// Unified market data gateway
///
/// One consistent surface over the stock and public-data providers, with
/// caching, per-client rate limiting, timeouts and metrics applied in a
/// single pipeline. Every call returns an envelope; upstream failures are
/// contained and reported through it, never propagated.
pub mod envelope;
pub mod metrics;
pub mod rate_limit;

pub use envelope::{
    DataSource, ErrorCode, ErrorInfo, GatewayResponse, RateLimitInfo, ResponseMetadata,
};
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use rate_limit::{RateLimitDecision, SlidingWindowLimiter};

use crate::apis::{PublicDataApi, StockDataApi};
use crate::batch::{BatchJobResult, BatchProcessor};
use crate::cache::MarketCache;
use crate::config::GatewaySettings;
use crate::errors::{GatewayError, GatewayResult};
use crate::logger::{self, LogTag};
use crate::types::{FinancialReport, NewsArticle, PriceBar, Quote, ReportPeriod};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Health of one upstream source group
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct SourceHealth {
    pub healthy: bool,
    pub providers: HashMap<String, bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceHealth {
    /// Collapse per-provider probes; unhealthy groups carry the failure
    /// detail in `error`
    fn from_probes(providers: HashMap<String, bool>) -> Self {
        let healthy = providers.values().any(|&ok| ok);
        let error = if healthy {
            None
        } else if providers.is_empty() {
            Some("no providers configured".to_string())
        } else {
            let mut failed: Vec<&str> = providers.keys().map(String::as_str).collect();
            failed.sort_unstable();
            Some(format!("all providers failing: {}", failed.join(", ")))
        };
        Self {
            healthy,
            providers,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub uptime_secs: u64,
    pub version: String,
    pub stock_sources: SourceHealth,
    pub public_data_sources: SourceHealth,
    pub cache_entries: usize,
}

pub struct ApiGateway {
    cache: Arc<MarketCache>,
    limiter: Arc<SlidingWindowLimiter>,
    metrics: Arc<GatewayMetrics>,
    stock_api: Arc<dyn StockDataApi>,
    public_data_api: Arc<dyn PublicDataApi>,
    batch: Arc<BatchProcessor>,
    settings: GatewaySettings,
    started_at: Instant,
}

impl ApiGateway {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: Arc<MarketCache>,
        limiter: Arc<SlidingWindowLimiter>,
        metrics: Arc<GatewayMetrics>,
        stock_api: Arc<dyn StockDataApi>,
        public_data_api: Arc<dyn PublicDataApi>,
        batch: Arc<BatchProcessor>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            cache,
            limiter,
            metrics,
            stock_api,
            public_data_api,
            batch,
            settings,
            started_at: Instant::now(),
        }
    }

    // Public surface

    pub async fn get_quote(&self, symbol: &str, client_id: &str) -> GatewayResponse<Quote> {
        let symbol = symbol.to_uppercase();
        let cache_key = format!("quote_{}", symbol);
        let ttl = self.cache.policy().quote_ttl;
        let stock_api = self.stock_api.clone();

        self.execute(&cache_key, client_id, ttl, || async move {
            stock_api.fetch_quote(&symbol).await
        })
        .await
    }

    /// Multi-symbol quotes, fanned out through the batch processor
    pub async fn get_quotes(
        &self,
        symbols: &[String],
        client_id: &str,
    ) -> GatewayResponse<HashMap<String, BatchJobResult<Quote>>> {
        let mut sorted: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        sorted.sort();
        let cache_key = format!("multi_quote_{}", sorted.join("_"));
        let ttl = self.cache.policy().quote_ttl;

        let batch = self.batch.clone();
        let stock_api = self.stock_api.clone();
        let symbols = symbols.to_vec();

        self.execute(&cache_key, client_id, ttl, || async move {
            let results = batch
                .fetch_quotes(&symbols, |symbol| {
                    let stock_api = stock_api.clone();
                    async move { stock_api.fetch_quote(&symbol).await }
                })
                .await;
            Ok(results)
        })
        .await
    }

    pub async fn get_historical(
        &self,
        symbol: &str,
        period: &str,
        client_id: &str,
    ) -> GatewayResponse<Vec<PriceBar>> {
        let symbol = symbol.to_uppercase();
        let cache_key = format!("historical_{}_{}", symbol, period);
        let ttl = self.cache.policy().historical_ttl;
        let period = period.to_string();
        let stock_api = self.stock_api.clone();

        self.execute(&cache_key, client_id, ttl, || async move {
            stock_api.fetch_historical(&symbol, &period).await
        })
        .await
    }

    pub async fn get_financials(
        &self,
        symbol: &str,
        period: ReportPeriod,
        client_id: &str,
    ) -> GatewayResponse<FinancialReport> {
        let symbol = symbol.to_uppercase();
        let cache_key = format!("financials_{}_{}", symbol, period.as_str());
        let ttl = self.cache.policy().sentiment_ttl;
        let stock_api = self.stock_api.clone();

        self.execute(&cache_key, client_id, ttl, || async move {
            stock_api.fetch_financials(&symbol, period).await
        })
        .await
    }

    pub async fn get_news(
        &self,
        symbol: &str,
        client_id: &str,
    ) -> GatewayResponse<Vec<NewsArticle>> {
        let symbol = symbol.to_uppercase();
        let cache_key = format!("news_{}", symbol);
        let ttl = self.cache.policy().news_ttl;
        let stock_api = self.stock_api.clone();

        self.execute(&cache_key, client_id, ttl, || async move {
            stock_api.fetch_news(&symbol).await
        })
        .await
    }

    pub async fn get_public_dataset(
        &self,
        name: &str,
        params: &HashMap<String, String>,
        client_id: &str,
    ) -> GatewayResponse<Vec<crate::types::DatasetRecord>> {
        // Params are part of identity, so they are part of the key
        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort_by_key(|(k, _)| k.as_str());
        let param_key: Vec<String> = sorted.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        let cache_key = format!("dataset_{}_{}", name, param_key.join("&"));
        let ttl = self.cache.policy().dataset_ttl;

        let name = name.to_string();
        let params = params.clone();
        let public_data_api = self.public_data_api.clone();

        self.execute(&cache_key, client_id, ttl, || async move {
            public_data_api.fetch_dataset(&name, &params).await
        })
        .await
    }

    /// Probe every upstream source group; failures are reported, not raised
    pub async fn get_health_status(&self) -> GatewayResponse<HealthStatus> {
        let request_id = envelope::generate_request_id();
        let started = Instant::now();

        let (stock_providers, public_providers) = futures::join!(
            self.stock_api.health_check(),
            self.public_data_api.health_check()
        );

        let status = HealthStatus {
            status: "healthy".to_string(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            stock_sources: SourceHealth::from_probes(stock_providers),
            public_data_sources: SourceHealth::from_probes(public_providers),
            cache_entries: self.cache.len(),
        };

        GatewayResponse::ok(
            status,
            ResponseMetadata {
                request_id,
                timestamp: Utc::now(),
                processing_time_ms: started.elapsed().as_millis() as u64,
                data_source: DataSource::System,
                cached: false,
                rate_limit: None,
            },
        )
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Clear cached entries, all of them or just keys matching a substring
    pub fn clear_cache(&self, pattern: Option<&str>) -> usize {
        match pattern {
            Some(pattern) => self.cache.invalidate_pattern(pattern),
            None => {
                let count = self.cache.len();
                self.cache.clear();
                count
            }
        }
    }

    // Pipeline

    /// Run one operation through the full pipeline: metrics, rate limit,
    /// cache probe, timeout-raced execution, cache write-through, envelope.
    async fn execute<T, F, Fut>(
        &self,
        cache_key: &str,
        client_id: &str,
        ttl: Duration,
        operation: F,
    ) -> GatewayResponse<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let request_id = envelope::generate_request_id();
        let started = Instant::now();
        self.metrics.record_request();

        if self.settings.enable_rate_limit {
            let decision = self.limiter.check(client_id);
            if !decision.allowed {
                self.metrics.record_rate_limited();
                logger::debug(
                    LogTag::Gateway,
                    &format!("Rate limited client '{}' on {}", client_id, cache_key),
                );
                return GatewayResponse::err(
                    ErrorCode::RateLimitExceeded,
                    "Too many requests. Please try again later.",
                    Some(json!({ "reset_time": decision.reset_time })),
                    ResponseMetadata {
                        request_id,
                        timestamp: Utc::now(),
                        processing_time_ms: started.elapsed().as_millis() as u64,
                        data_source: DataSource::Gateway,
                        cached: false,
                        rate_limit: Some(RateLimitInfo {
                            remaining: decision.remaining,
                            reset_time: decision.reset_time,
                        }),
                    },
                );
            }
        }

        if self.settings.enable_caching {
            if let Some(data) = self.cache.get_value::<T>(cache_key) {
                self.metrics.record_cache_hit();
                let elapsed = started.elapsed().as_millis() as u64;
                self.metrics.record_success(elapsed);
                return GatewayResponse::ok(
                    data,
                    ResponseMetadata {
                        request_id,
                        timestamp: Utc::now(),
                        processing_time_ms: elapsed,
                        data_source: DataSource::Cache,
                        cached: true,
                        rate_limit: None,
                    },
                );
            }
            self.metrics.record_cache_miss();
        }

        let timeout = Duration::from_millis(self.settings.request_timeout_ms);
        let outcome = match tokio::time::timeout(timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout {
                operation: cache_key.to_string(),
                timeout_ms: self.settings.request_timeout_ms,
            }),
        };

        match outcome {
            Ok(data) => {
                if self.settings.enable_caching {
                    self.cache.set_value(cache_key, &data, ttl);
                }
                let elapsed = started.elapsed().as_millis() as u64;
                self.metrics.record_success(elapsed);
                GatewayResponse::ok(
                    data,
                    ResponseMetadata {
                        request_id,
                        timestamp: Utc::now(),
                        processing_time_ms: elapsed,
                        data_source: DataSource::Api,
                        cached: false,
                        rate_limit: None,
                    },
                )
            }
            Err(err) => {
                self.metrics.record_error();
                logger::warning(
                    LogTag::Gateway,
                    &format!("Operation {} failed: {}", cache_key, err),
                );
                GatewayResponse::err(
                    ErrorCode::OperationFailed,
                    err.to_string(),
                    Some(json!({ "operation": cache_key })),
                    ResponseMetadata {
                        request_id,
                        timestamp: Utc::now(),
                        processing_time_ms: started.elapsed().as_millis() as u64,
                        data_source: DataSource::Gateway,
                        cached: false,
                        rate_limit: None,
                    },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use crate::config::{BatchSettings, CacheSettings};
    use crate::errors::GatewayError;
    use crate::types::DatasetRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockStockApi {
        quote_calls: AtomicUsize,
        fail: bool,
        delay: Duration,
        healthy: bool,
    }

    impl Default for MockStockApi {
        fn default() -> Self {
            Self {
                quote_calls: AtomicUsize::new(0),
                fail: false,
                delay: Duration::ZERO,
                healthy: true,
            }
        }
    }

    #[async_trait]
    impl StockDataApi for MockStockApi {
        async fn fetch_quote(&self, symbol: &str) -> GatewayResult<Quote> {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(GatewayError::upstream("mock", "provider down"));
            }
            Ok(Quote::simple(symbol, 100.0, 1_000))
        }

        async fn fetch_quotes(&self, symbols: &[String]) -> GatewayResult<Vec<Quote>> {
            let mut out = Vec::new();
            for symbol in symbols {
                out.push(self.fetch_quote(symbol).await?);
            }
            Ok(out)
        }

        async fn fetch_historical(
            &self,
            symbol: &str,
            _period: &str,
        ) -> GatewayResult<Vec<PriceBar>> {
            Ok(vec![PriceBar {
                symbol: symbol.to_string(),
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 10,
                timestamp: Utc::now(),
            }])
        }

        async fn fetch_financials(
            &self,
            _symbol: &str,
            _period: ReportPeriod,
        ) -> GatewayResult<FinancialReport> {
            Err(GatewayError::upstream("mock", "not implemented"))
        }

        async fn fetch_news(&self, _symbol: &str) -> GatewayResult<Vec<NewsArticle>> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> HashMap<String, bool> {
            HashMap::from([("mock".to_string(), self.healthy)])
        }
    }

    struct MockPublicApi;

    #[async_trait]
    impl PublicDataApi for MockPublicApi {
        async fn fetch_dataset(
            &self,
            name: &str,
            _params: &HashMap<String, String>,
        ) -> GatewayResult<Vec<DatasetRecord>> {
            Ok(vec![DatasetRecord {
                dataset: name.to_string(),
                fields: HashMap::new(),
            }])
        }

        async fn health_check(&self) -> HashMap<String, bool> {
            HashMap::from([("public_data".to_string(), false)])
        }
    }

    fn gateway_with(stock: Arc<MockStockApi>, settings: GatewaySettings) -> ApiGateway {
        let cache = Arc::new(MarketCache::new(
            CacheSettings::default().max_entries,
            CachePolicy::default(),
        ));
        let batch = Arc::new(BatchProcessor::new(
            cache.clone(),
            BatchSettings {
                retry_base_delay_ms: 1,
                ..BatchSettings::default()
            },
        ));
        ApiGateway::new(
            cache,
            Arc::new(SlidingWindowLimiter::new(Duration::from_secs(60), 100)),
            Arc::new(GatewayMetrics::new()),
            stock,
            Arc::new(MockPublicApi),
            batch,
            settings,
        )
    }

    #[tokio::test]
    async fn cache_hit_skips_second_fetch() {
        let stock = Arc::new(MockStockApi::default());
        let gateway = gateway_with(stock.clone(), GatewaySettings::default());

        let first = gateway.get_quote("AAPL", "client").await;
        assert!(first.success);
        assert_eq!(first.metadata.data_source, DataSource::Api);
        assert!(!first.metadata.cached);

        let second = gateway.get_quote("AAPL", "client").await;
        assert!(second.success);
        assert_eq!(second.metadata.data_source, DataSource::Cache);
        assert!(second.metadata.cached);

        // Upstream touched exactly once across both calls
        assert_eq!(stock.quote_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.metrics().cache_hits, 1);
    }

    #[tokio::test]
    async fn rate_limit_envelope_carries_reset_info() {
        let gateway = gateway_with(Arc::new(MockStockApi::default()), GatewaySettings::default());
        let restrictive = SlidingWindowLimiter::new(Duration::from_secs(60), 1);
        let gateway = ApiGateway {
            limiter: Arc::new(restrictive),
            ..gateway
        };

        assert!(gateway.get_quote("AAPL", "busy").await.success);

        let rejected = gateway.get_quote("MSFT", "busy").await;
        assert!(!rejected.success);
        let error = rejected.error.unwrap();
        assert_eq!(error.code, ErrorCode::RateLimitExceeded);
        let rate_limit = rejected.metadata.rate_limit.unwrap();
        assert_eq!(rate_limit.remaining, 0);
        assert_eq!(rejected.metadata.data_source, DataSource::Gateway);
    }

    #[tokio::test]
    async fn timeout_is_contained_in_envelope() {
        let stock = MockStockApi {
            delay: Duration::from_secs(5),
            ..MockStockApi::default()
        };
        let settings = GatewaySettings {
            request_timeout_ms: 200,
            ..GatewaySettings::default()
        };
        let gateway = gateway_with(Arc::new(stock), settings);

        let started = Instant::now();
        let response = gateway.get_quote("SLOW", "client").await;
        assert!(started.elapsed() < Duration::from_secs(1));

        assert!(!response.success);
        let error = response.error.unwrap();
        assert_eq!(error.code, ErrorCode::OperationFailed);
        assert!(error.message.contains("Request timeout"));
    }

    #[tokio::test]
    async fn upstream_failure_becomes_operation_failed() {
        let stock = MockStockApi {
            fail: true,
            ..MockStockApi::default()
        };
        let gateway = gateway_with(Arc::new(stock), GatewaySettings::default());

        let response = gateway.get_quote("AAPL", "client").await;
        assert!(!response.success);
        assert_eq!(response.error.unwrap().code, ErrorCode::OperationFailed);
        assert_eq!(gateway.metrics().errors, 1);
    }

    #[tokio::test]
    async fn failed_operations_are_not_cached() {
        let stock = MockStockApi {
            fail: true,
            ..MockStockApi::default()
        };
        let gateway = gateway_with(Arc::new(stock), GatewaySettings::default());

        gateway.get_quote("AAPL", "client").await;
        gateway.get_quote("AAPL", "client").await;

        // Both calls reached the upstream
        assert_eq!(gateway.metrics().errors, 2);
        assert_eq!(gateway.metrics().cache_hits, 0);
    }

    #[tokio::test]
    async fn health_status_never_fails() {
        let stock = MockStockApi {
            healthy: false,
            ..MockStockApi::default()
        };
        let gateway = gateway_with(Arc::new(stock), GatewaySettings::default());

        let response = gateway.get_health_status().await;
        assert!(response.success);
        let health = response.data.unwrap();
        assert!(!health.stock_sources.healthy);
        assert_eq!(
            health.stock_sources.error.as_deref(),
            Some("all providers failing: mock")
        );
        assert!(!health.public_data_sources.healthy);
        assert_eq!(
            health.public_data_sources.error.as_deref(),
            Some("all providers failing: public_data")
        );
        assert_eq!(response.metadata.data_source, DataSource::System);
    }

    #[tokio::test]
    async fn multi_quote_goes_through_batch() {
        let gateway = gateway_with(Arc::new(MockStockApi::default()), GatewaySettings::default());

        let symbols = vec!["AAPL".to_string(), "MSFT".to_string()];
        let response = gateway.get_quotes(&symbols, "client").await;
        assert!(response.success);

        let results = response.data.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results["AAPL"].success);
        assert!(results["MSFT"].success);
        assert_eq!(gateway.batch.stats().completed_jobs, 2);
    }

    #[tokio::test]
    async fn clear_cache_by_pattern() {
        let gateway = gateway_with(Arc::new(MockStockApi::default()), GatewaySettings::default());

        gateway.get_quote("AAPL", "client").await;
        gateway.get_historical("AAPL", "1mo", "client").await;

        assert_eq!(gateway.clear_cache(Some("quote_")), 1);
        assert_eq!(gateway.clear_cache(None), 1);
    }

    #[tokio::test]
    async fn disabled_caching_always_fetches() {
        let settings = GatewaySettings {
            enable_caching: false,
            ..GatewaySettings::default()
        };
        let gateway = gateway_with(Arc::new(MockStockApi::default()), settings);

        let first = gateway.get_quote("AAPL", "client").await;
        let second = gateway.get_quote("AAPL", "client").await;
        assert!(!first.metadata.cached);
        assert!(!second.metadata.cached);
        assert_eq!(second.metadata.data_source, DataSource::Api);
        assert_eq!(gateway.metrics().cache_hits, 0);
    }
}
