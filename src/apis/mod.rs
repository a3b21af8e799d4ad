/// Upstream data source clients
///
/// Each provider group sits behind a trait so the gateway, batch and stream
/// layers can be wired with mock implementations in tests. The HTTP
/// implementations normalize provider payloads into the shared types.
pub mod client;
pub mod public_data;
pub mod stock;

use crate::errors::GatewayResult;
use crate::types::{DatasetRecord, FinancialReport, NewsArticle, PriceBar, Quote, ReportPeriod};
use async_trait::async_trait;
use std::collections::HashMap;

pub use public_data::HttpPublicDataApi;
pub use stock::HttpStockDataApi;

/// Stock market data provider group (quotes, history, financials, news)
#[async_trait]
pub trait StockDataApi: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> GatewayResult<Quote>;

    /// Fetch several symbols; per-symbol failures are dropped, not fatal
    async fn fetch_quotes(&self, symbols: &[String]) -> GatewayResult<Vec<Quote>>;

    async fn fetch_historical(&self, symbol: &str, period: &str) -> GatewayResult<Vec<PriceBar>>;

    async fn fetch_financials(
        &self,
        symbol: &str,
        period: ReportPeriod,
    ) -> GatewayResult<FinancialReport>;

    async fn fetch_news(&self, symbol: &str) -> GatewayResult<Vec<NewsArticle>>;

    /// Probe each underlying provider; key is the provider name
    async fn health_check(&self) -> HashMap<String, bool>;
}

/// Public open-data provider (datasets keyed by name)
#[async_trait]
pub trait PublicDataApi: Send + Sync {
    async fn fetch_dataset(
        &self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> GatewayResult<Vec<DatasetRecord>>;

    async fn health_check(&self) -> HashMap<String, bool>;
}
