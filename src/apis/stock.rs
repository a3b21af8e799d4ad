/// Stock data HTTP client with primary/fallback providers
///
/// Quotes try the primary chart endpoint first and fall back to the
/// secondary provider on any error; only when both fail does the caller see
/// an error, and it names both causes. Historical bars come from the
/// primary, financials and news from the fallback provider only, matching
/// what each provider actually serves.
use crate::apis::client::{HttpClient, RequestPacer};
use crate::apis::StockDataApi;
use crate::config::StockSourceSettings;
use crate::errors::{GatewayError, GatewayResult, UpstreamError};
use crate::logger::{self, LogTag};
use crate::types::{FinancialReport, NewsArticle, PriceBar, Quote, ReportPeriod};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;

const PRIMARY: &str = "primary";
const FALLBACK: &str = "fallback";

pub struct HttpStockDataApi {
    http: HttpClient,
    pacer: RequestPacer,
    primary_base_url: String,
    fallback_base_url: String,
    api_key: Option<String>,
}

impl HttpStockDataApi {
    pub fn new(settings: &StockSourceSettings) -> GatewayResult<Self> {
        Ok(Self {
            http: HttpClient::new(settings.timeout_seconds)?,
            pacer: RequestPacer::new(settings.rate_limit_per_minute),
            primary_base_url: settings.primary_base_url.trim_end_matches('/').to_string(),
            fallback_base_url: settings.fallback_base_url.trim_end_matches('/').to_string(),
            api_key: std::env::var(&settings.api_key_env).ok(),
        })
    }

    fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or("demo")
    }

    async fn fetch_quote_primary(&self, symbol: &str) -> GatewayResult<Quote> {
        let _guard = self.pacer.acquire().await?;
        let url = format!(
            "{}/finance/chart/{}?interval=1d&range=1d",
            self.primary_base_url, symbol
        );
        let body = self.http.get_json(&url).await?;
        parse_chart_quote(symbol, &body)
    }

    async fn fetch_quote_fallback(&self, symbol: &str) -> GatewayResult<Quote> {
        let _guard = self.pacer.acquire().await?;
        let url = format!(
            "{}?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            self.fallback_base_url,
            symbol,
            self.api_key()
        );
        let body = self.http.get_json(&url).await?;
        parse_global_quote(symbol, &body)
    }
}

#[async_trait]
impl StockDataApi for HttpStockDataApi {
    async fn fetch_quote(&self, symbol: &str) -> GatewayResult<Quote> {
        let primary_err = match self.fetch_quote_primary(symbol).await {
            Ok(quote) => return Ok(quote),
            Err(err) => err,
        };

        logger::debug(
            LogTag::Api,
            &format!(
                "Primary quote source failed for {}, trying fallback: {}",
                symbol, primary_err
            ),
        );

        match self.fetch_quote_fallback(symbol).await {
            Ok(quote) => Ok(quote),
            Err(fallback_err) => Err(GatewayError::Upstream(UpstreamError::AllProvidersFailed {
                symbol: symbol.to_string(),
                primary: primary_err.to_string(),
                fallback: fallback_err.to_string(),
            })),
        }
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> GatewayResult<Vec<Quote>> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.fetch_quote(symbol).await {
                Ok(quote) => quotes.push(quote),
                Err(err) => {
                    logger::warning(
                        LogTag::Api,
                        &format!("Skipping {} in multi-quote fetch: {}", symbol, err),
                    );
                }
            }
        }
        Ok(quotes)
    }

    async fn fetch_historical(&self, symbol: &str, period: &str) -> GatewayResult<Vec<PriceBar>> {
        let _guard = self.pacer.acquire().await?;
        let url = format!(
            "{}/finance/chart/{}?interval=1d&range={}",
            self.primary_base_url, symbol, period
        );
        let body = self.http.get_json(&url).await?;
        parse_chart_bars(symbol, &body)
    }

    async fn fetch_financials(
        &self,
        symbol: &str,
        period: ReportPeriod,
    ) -> GatewayResult<FinancialReport> {
        let _guard = self.pacer.acquire().await?;
        let url = format!(
            "{}?function=INCOME_STATEMENT&symbol={}&apikey={}",
            self.fallback_base_url,
            symbol,
            self.api_key()
        );
        let body = self.http.get_json(&url).await?;
        parse_financials(symbol, period, &body)
    }

    async fn fetch_news(&self, symbol: &str) -> GatewayResult<Vec<NewsArticle>> {
        let _guard = self.pacer.acquire().await?;
        let url = format!(
            "{}?function=NEWS_SENTIMENT&tickers={}&apikey={}",
            self.fallback_base_url,
            symbol,
            self.api_key()
        );
        let body = self.http.get_json(&url).await?;
        parse_news(symbol, &body)
    }

    async fn health_check(&self) -> HashMap<String, bool> {
        // A cheap known-good symbol probe per provider
        let primary_ok = self.fetch_quote_primary("AAPL").await.is_ok();
        let fallback_ok = self.fetch_quote_fallback("AAPL").await.is_ok();

        HashMap::from([
            (PRIMARY.to_string(), primary_ok),
            (FALLBACK.to_string(), fallback_ok),
        ])
    }
}

// Payload normalization

fn malformed(provider: &str, detail: impl Into<String>) -> GatewayError {
    GatewayError::Upstream(UpstreamError::MalformedResponse {
        provider: provider.to_string(),
        detail: detail.into(),
    })
}

fn f64_field(value: &serde_json::Value, key: &str) -> Option<f64> {
    let field = value.get(key)?;
    field
        .as_f64()
        .or_else(|| field.as_str().and_then(|s| s.parse().ok()))
}

fn parse_chart_quote(symbol: &str, body: &serde_json::Value) -> GatewayResult<Quote> {
    let meta = body["chart"]["result"]
        .get(0)
        .and_then(|r| r.get("meta"))
        .ok_or_else(|| malformed(PRIMARY, "missing chart.result[0].meta"))?;

    let price = f64_field(meta, "regularMarketPrice")
        .ok_or_else(|| malformed(PRIMARY, "missing regularMarketPrice"))?;
    let previous_close = f64_field(meta, "chartPreviousClose").unwrap_or(price);
    let change = price - previous_close;

    Ok(Quote {
        symbol: symbol.to_uppercase(),
        company_name: meta
            .get("longName")
            .and_then(|v| v.as_str())
            .unwrap_or(symbol)
            .to_string(),
        price,
        change,
        change_percent: if previous_close != 0.0 {
            change / previous_close * 100.0
        } else {
            0.0
        },
        day_high: f64_field(meta, "regularMarketDayHigh").unwrap_or(price),
        day_low: f64_field(meta, "regularMarketDayLow").unwrap_or(price),
        volume: meta
            .get("regularMarketVolume")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        market_cap: f64_field(meta, "marketCap"),
        currency: meta
            .get("currency")
            .and_then(|v| v.as_str())
            .unwrap_or("USD")
            .to_string(),
        exchange: meta
            .get("exchangeName")
            .and_then(|v| v.as_str())
            .unwrap_or("UNKNOWN")
            .to_string(),
        timestamp: Utc::now(),
    })
}

fn parse_global_quote(symbol: &str, body: &serde_json::Value) -> GatewayResult<Quote> {
    let quote = body
        .get("Global Quote")
        .filter(|q| q.as_object().map(|o| !o.is_empty()).unwrap_or(false))
        .ok_or_else(|| {
            GatewayError::Upstream(UpstreamError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
        })?;

    let price = f64_field(quote, "05. price")
        .ok_or_else(|| malformed(FALLBACK, "missing price field"))?;

    Ok(Quote {
        symbol: symbol.to_uppercase(),
        company_name: symbol.to_uppercase(),
        price,
        change: f64_field(quote, "09. change").unwrap_or(0.0),
        change_percent: quote
            .get("10. change percent")
            .and_then(|v| v.as_str())
            .and_then(|s| s.trim_end_matches('%').parse().ok())
            .unwrap_or(0.0),
        day_high: f64_field(quote, "03. high").unwrap_or(price),
        day_low: f64_field(quote, "04. low").unwrap_or(price),
        volume: quote
            .get("06. volume")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        market_cap: None,
        currency: "USD".to_string(),
        exchange: "UNKNOWN".to_string(),
        timestamp: Utc::now(),
    })
}

fn parse_chart_bars(symbol: &str, body: &serde_json::Value) -> GatewayResult<Vec<PriceBar>> {
    let result = body["chart"]["result"]
        .get(0)
        .ok_or_else(|| malformed(PRIMARY, "missing chart.result[0]"))?;

    let timestamps = result
        .get("timestamp")
        .and_then(|v| v.as_array())
        .ok_or_else(|| malformed(PRIMARY, "missing timestamp array"))?;
    let ohlcv = result["indicators"]["quote"]
        .get(0)
        .ok_or_else(|| malformed(PRIMARY, "missing indicators.quote[0]"))?;

    let series = |key: &str| -> Vec<Option<f64>> {
        ohlcv
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(|v| v.as_f64()).collect())
            .unwrap_or_default()
    };

    let opens = series("open");
    let highs = series("high");
    let lows = series("low");
    let closes = series("close");
    let volumes = series("volume");

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, stamp) in timestamps.iter().enumerate() {
        // Providers emit null rows for halted sessions; skip them
        let (Some(open), Some(high), Some(low), Some(close)) = (
            opens.get(i).copied().flatten(),
            highs.get(i).copied().flatten(),
            lows.get(i).copied().flatten(),
            closes.get(i).copied().flatten(),
        ) else {
            continue;
        };

        let timestamp = stamp
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);

        bars.push(PriceBar {
            symbol: symbol.to_uppercase(),
            open,
            high,
            low,
            close,
            volume: volumes.get(i).copied().flatten().unwrap_or(0.0) as u64,
            timestamp,
        });
    }

    Ok(bars)
}

fn parse_financials(
    symbol: &str,
    period: ReportPeriod,
    body: &serde_json::Value,
) -> GatewayResult<FinancialReport> {
    let reports_key = match period {
        ReportPeriod::Annual => "annualReports",
        ReportPeriod::Quarterly => "quarterlyReports",
    };

    let report = body
        .get(reports_key)
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| malformed(FALLBACK, format!("missing {}", reports_key)))?;

    let report_date = report
        .get("fiscalDateEnding")
        .and_then(|v| v.as_str())
        .and_then(|s| format!("{}T00:00:00Z", s).parse::<DateTime<Utc>>().ok())
        .unwrap_or_else(Utc::now);

    Ok(FinancialReport {
        symbol: symbol.to_uppercase(),
        period,
        fiscal_year: report_date.format("%Y").to_string().parse().unwrap_or(0),
        fiscal_quarter: None,
        report_date,
        currency: report
            .get("reportedCurrency")
            .and_then(|v| v.as_str())
            .unwrap_or("USD")
            .to_string(),
        revenue: f64_field(report, "totalRevenue"),
        operating_income: f64_field(report, "operatingIncome"),
        net_income: f64_field(report, "netIncome"),
        total_assets: f64_field(report, "totalAssets"),
        total_liabilities: f64_field(report, "totalLiabilities"),
        operating_cash_flow: f64_field(report, "operatingCashflow"),
    })
}

fn parse_news(symbol: &str, body: &serde_json::Value) -> GatewayResult<Vec<NewsArticle>> {
    let feed = body
        .get("feed")
        .and_then(|v| v.as_array())
        .ok_or_else(|| malformed(FALLBACK, "missing feed"))?;

    let articles = feed
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let title = item.get("title")?.as_str()?.to_string();
            Some(NewsArticle {
                id: format!("{}_{}", symbol.to_uppercase(), i),
                title,
                summary: item
                    .get("summary")
                    .and_then(|v| v.as_str())
                    .map(String::from),
                source: item
                    .get("source")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                url: item
                    .get("url")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                published_at: item
                    .get("time_published")
                    .and_then(|v| v.as_str())
                    .and_then(parse_compact_timestamp)
                    .unwrap_or_else(Utc::now),
                related_symbols: vec![symbol.to_uppercase()],
                sentiment: f64_field(item, "overall_sentiment_score"),
            })
        })
        .collect();

    Ok(articles)
}

// "20260829T101500" style timestamps
fn parse_compact_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
