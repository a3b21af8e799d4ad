/// Shared market data types
///
/// Typed payloads for everything that crosses the gateway boundary. Upstream
/// responses are normalized into these shapes by the API clients so the
/// cache, batch and stream layers never see provider-specific JSON.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current quote for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub company_name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub volume: u64,
    pub market_cap: Option<f64>,
    pub currency: String,
    pub exchange: String,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Minimal quote used by tests and synthetic data paths
    pub fn simple(symbol: &str, price: f64, volume: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            company_name: symbol.to_string(),
            price,
            change: 0.0,
            change_percent: 0.0,
            day_high: price,
            day_low: price,
            volume,
            market_cap: None,
            currency: "USD".to_string(),
            exchange: "TEST".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// One OHLCV bar of historical data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub timestamp: DateTime<Utc>,
}

/// News article linked to one or more symbols
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    pub source: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub related_symbols: Vec<String>,
    /// -1.0 (bearish) to 1.0 (bullish), when the provider scores it
    pub sentiment: Option<f64>,
}

/// Reporting period for financial statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    Annual,
    Quarterly,
}

impl ReportPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::Annual => "annual",
            ReportPeriod::Quarterly => "quarterly",
        }
    }
}

/// Financial statement summary for one fiscal period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialReport {
    pub symbol: String,
    pub period: ReportPeriod,
    pub fiscal_year: u32,
    pub fiscal_quarter: Option<u8>,
    pub report_date: DateTime<Utc>,
    pub currency: String,
    pub revenue: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub operating_cash_flow: Option<f64>,
}

/// One row of a public dataset (e.g. pension fund holdings)
///
/// Datasets vary in shape per provider, so rows are name→value maps with a
/// few well-known fields pulled out by consumers as needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub dataset: String,
    pub fields: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_roundtrips_through_json() {
        let quote = Quote::simple("AAPL", 187.5, 1_000_000);
        let json = serde_json::to_value(&quote).unwrap();
        let back: Quote = serde_json::from_value(json).unwrap();
        assert_eq!(back, quote);
    }

    #[test]
    fn report_period_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ReportPeriod::Quarterly).unwrap(),
            "\"quarterly\""
        );
    }
}
