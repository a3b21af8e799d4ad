/// Real-time market data streaming
///
/// Polling-based streaming: a main loop fetches the union of all subscribed
/// symbols through the batch processor, diffs against the last-price
/// snapshot, and pushes typed updates to subscriber callbacks. A faster
/// alert loop scans snapshot deltas against global thresholds and broadcasts
/// market alerts. Loop bodies are exposed as plain methods so tests can
/// drive ticks directly.
use crate::apis::StockDataApi;
use crate::batch::BatchProcessor;
use crate::config::StreamSettings;
use crate::logger::{self, LogTag};
use crate::types::Quote;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub type UpdateCallback = Arc<dyn Fn(RealTimeUpdate) + Send + Sync>;
pub type AlertCallback = Arc<dyn Fn(MarketAlert) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Regular diff-driven price update
    Price,
    /// First push right after subscribing
    Initial,
}

/// Typed payload delivered to subscription callbacks
#[derive(Debug, Clone, Serialize)]
pub struct RealTimeUpdate {
    pub kind: UpdateKind,
    pub symbol: String,
    pub quote: Quote,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PriceSpike,
    VolumeSurge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Medium,
    High,
}

/// Market-wide alert broadcast to all alert listeners
#[derive(Debug, Clone, Serialize)]
pub struct MarketAlert {
    pub kind: AlertKind,
    pub symbol: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub change_percent: f64,
    pub timestamp_ms: u64,
}

/// Optional per-subscription delivery filters
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilters {
    /// Suppress updates whose move is below this percentage
    pub price_change_threshold_pct: Option<f64>,
    /// Suppress updates from symbols trading below this volume
    pub volume_floor: Option<u64>,
}

struct Subscription {
    symbols: Vec<String>,
    callback: UpdateCallback,
    filters: SubscriptionFilters,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamStats {
    pub active_subscriptions: usize,
    pub distinct_symbols: usize,
    pub snapshot_size: usize,
    pub updates_dispatched: u64,
    pub alerts_sent: u64,
}

pub struct RealTimeDataService {
    batch: Arc<BatchProcessor>,
    stock_api: Arc<dyn StockDataApi>,
    settings: StreamSettings,

    subscriptions: Mutex<HashMap<String, Subscription>>,
    snapshot: Mutex<HashMap<String, Quote>>,
    // Previous snapshot as of the last alert scan, so alert deltas are
    // between scans rather than between fetches
    alert_baseline: Mutex<HashMap<String, Quote>>,
    alert_listeners: Mutex<Vec<AlertCallback>>,

    updates_dispatched: AtomicU64,
    alerts_sent: AtomicU64,
    stop_signal: Notify,
}

impl RealTimeDataService {
    pub fn new(
        batch: Arc<BatchProcessor>,
        stock_api: Arc<dyn StockDataApi>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            batch,
            stock_api,
            settings,
            subscriptions: Mutex::new(HashMap::new()),
            snapshot: Mutex::new(HashMap::new()),
            alert_baseline: Mutex::new(HashMap::new()),
            alert_listeners: Mutex::new(Vec::new()),
            updates_dispatched: AtomicU64::new(0),
            alerts_sent: AtomicU64::new(0),
            stop_signal: Notify::new(),
        }
    }

    /// Register a subscription and push initial data straight away
    pub async fn subscribe(
        self: &Arc<Self>,
        id: &str,
        symbols: Vec<String>,
        filters: SubscriptionFilters,
        callback: UpdateCallback,
    ) {
        let symbols: Vec<String> = symbols
            .into_iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        logger::info(
            LogTag::Stream,
            &format!("Subscription '{}' registered for {} symbols", id, symbols.len()),
        );

        self.subscriptions.lock().insert(
            id.to_string(),
            Subscription {
                symbols: symbols.clone(),
                callback: callback.clone(),
                filters,
            },
        );

        self.send_initial_data(&symbols, &callback).await;
    }

    pub fn unsubscribe(&self, id: &str) -> bool {
        let removed = self.subscriptions.lock().remove(id).is_some();
        if removed {
            logger::info(LogTag::Stream, &format!("Subscription '{}' removed", id));
        }
        removed
    }

    pub fn subscribe_to_alerts(&self, callback: AlertCallback) {
        self.alert_listeners.lock().push(callback);
    }

    /// Spawn the update and alert loops; both run until `stop` is called
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let update_interval = Duration::from_secs(self.settings.update_interval_secs);
        let alert_interval = Duration::from_secs((self.settings.update_interval_secs / 4).max(1));

        let update_service = self.clone();
        let update_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = update_service.stop_signal.notified() => break,
                    _ = tokio::time::sleep(update_interval) => {
                        update_service.run_update_pass().await;
                    }
                }
            }
            logger::info(LogTag::Stream, "Update loop stopped");
        });

        let alert_service = self.clone();
        let alerts_enabled = self.settings.enable_alerts;
        let alert_handle = tokio::spawn(async move {
            if !alerts_enabled {
                return;
            }
            loop {
                tokio::select! {
                    _ = alert_service.stop_signal.notified() => break,
                    _ = tokio::time::sleep(alert_interval) => {
                        alert_service.run_alert_scan();
                    }
                }
            }
            logger::info(LogTag::Stream, "Alert loop stopped");
        });

        vec![update_handle, alert_handle]
    }

    /// Halt the loops and drop all streaming state
    pub fn stop(&self) {
        self.stop_signal.notify_waiters();
        self.subscriptions.lock().clear();
        self.alert_listeners.lock().clear();
        self.snapshot.lock().clear();
        self.alert_baseline.lock().clear();
        logger::info(LogTag::Stream, "Real-time service stopped");
    }

    /// One tick of the main loop: fetch, diff, dispatch, update snapshot
    pub async fn run_update_pass(&self) {
        let union: Vec<String> = {
            let subscriptions = self.subscriptions.lock();
            let mut set = HashSet::new();
            for sub in subscriptions.values() {
                set.extend(sub.symbols.iter().cloned());
            }
            set.into_iter().collect()
        };

        if union.is_empty() {
            return;
        }

        let stock_api = self.stock_api.clone();
        let results = self
            .batch
            .fetch_quotes(&union, |symbol| {
                let stock_api = stock_api.clone();
                async move { stock_api.fetch_quote(&symbol).await }
            })
            .await;

        let fresh: HashMap<String, Quote> = results
            .into_iter()
            .filter_map(|(symbol, result)| result.data.map(|quote| (symbol, quote)))
            .collect();

        // Diff against the snapshot as it was before this pass
        let previous = self.snapshot.lock().clone();
        let subscribers: Vec<(UpdateCallback, Vec<String>, SubscriptionFilters)> = self
            .subscriptions
            .lock()
            .values()
            .map(|sub| (sub.callback.clone(), sub.symbols.clone(), sub.filters.clone()))
            .collect();

        let now_ms = now_millis();
        let mut dispatched = 0u64;

        for (callback, symbols, filters) in subscribers {
            for symbol in &symbols {
                let Some(current) = fresh.get(symbol) else {
                    continue;
                };
                let last = previous.get(symbol);

                let moved = match last {
                    Some(last) => {
                        (current.price - last.price).abs() > self.settings.price_epsilon
                    }
                    None => true,
                };
                if !moved {
                    continue;
                }

                if !passes_filters(&filters, current, last) {
                    continue;
                }

                callback(RealTimeUpdate {
                    kind: UpdateKind::Price,
                    symbol: symbol.clone(),
                    quote: current.clone(),
                    timestamp_ms: now_ms,
                });
                dispatched += 1;
            }
        }

        // Snapshot advances whether or not anything was delivered
        self.snapshot.lock().extend(fresh);
        if dispatched > 0 {
            self.updates_dispatched.fetch_add(dispatched, Ordering::Relaxed);
            logger::debug(
                LogTag::Stream,
                &format!("Dispatched {} updates", dispatched),
            );
        }
    }

    /// One tick of the alert loop: compare the snapshot to the last scan
    pub fn run_alert_scan(&self) {
        let listeners = self.alert_listeners.lock().clone();
        if listeners.is_empty() {
            return;
        }

        let snapshot = self.snapshot.lock().clone();
        let baseline = self.alert_baseline.lock().clone();
        let now_ms = now_millis();
        let mut alerts = Vec::new();

        for (symbol, current) in &snapshot {
            let Some(prev) = baseline.get(symbol) else {
                continue;
            };

            if prev.price != 0.0 {
                let change_pct = (current.price - prev.price) / prev.price * 100.0;
                if change_pct.abs() >= self.settings.price_change_threshold_pct {
                    alerts.push(MarketAlert {
                        kind: AlertKind::PriceSpike,
                        symbol: symbol.clone(),
                        message: format!(
                            "{} moved {:+.2}% (from {:.2} to {:.2})",
                            symbol, change_pct, prev.price, current.price
                        ),
                        severity: if change_pct.abs() > 5.0 {
                            AlertSeverity::High
                        } else {
                            AlertSeverity::Medium
                        },
                        change_percent: change_pct,
                        timestamp_ms: now_ms,
                    });
                }
            }

            if prev.volume > 0 {
                let volume_change_pct =
                    (current.volume as f64 - prev.volume as f64) / prev.volume as f64 * 100.0;
                if volume_change_pct >= self.settings.volume_change_threshold_pct {
                    alerts.push(MarketAlert {
                        kind: AlertKind::VolumeSurge,
                        symbol: symbol.clone(),
                        message: format!(
                            "{} volume surged {:.1}%",
                            symbol, volume_change_pct
                        ),
                        severity: if volume_change_pct > 100.0 {
                            AlertSeverity::High
                        } else {
                            AlertSeverity::Medium
                        },
                        change_percent: volume_change_pct,
                        timestamp_ms: now_ms,
                    });
                }
            }
        }

        for alert in &alerts {
            for listener in &listeners {
                listener(alert.clone());
            }
        }
        if !alerts.is_empty() {
            self.alerts_sent
                .fetch_add(alerts.len() as u64, Ordering::Relaxed);
            logger::debug(LogTag::Stream, &format!("Sent {} alerts", alerts.len()));
        }

        *self.alert_baseline.lock() = snapshot;
    }

    pub fn stats(&self) -> StreamStats {
        let subscriptions = self.subscriptions.lock();
        let distinct: HashSet<&String> = subscriptions
            .values()
            .flat_map(|sub| sub.symbols.iter())
            .collect();

        StreamStats {
            active_subscriptions: subscriptions.len(),
            distinct_symbols: distinct.len(),
            snapshot_size: self.snapshot.lock().len(),
            updates_dispatched: self.updates_dispatched.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
        }
    }

    async fn send_initial_data(&self, symbols: &[String], callback: &UpdateCallback) {
        let stock_api = self.stock_api.clone();
        let results = self
            .batch
            .fetch_quotes(symbols, |symbol| {
                let stock_api = stock_api.clone();
                async move { stock_api.fetch_quote(&symbol).await }
            })
            .await;

        let now_ms = now_millis();
        let mut snapshot = self.snapshot.lock();
        for (symbol, result) in results {
            let Some(quote) = result.data else {
                continue;
            };
            callback(RealTimeUpdate {
                kind: UpdateKind::Initial,
                symbol: symbol.clone(),
                quote: quote.clone(),
                timestamp_ms: now_ms,
            });
            snapshot.insert(symbol, quote);
        }
    }
}

fn passes_filters(filters: &SubscriptionFilters, current: &Quote, last: Option<&Quote>) -> bool {
    if let (Some(threshold), Some(last)) = (filters.price_change_threshold_pct, last) {
        if last.price != 0.0 {
            let change_pct = ((current.price - last.price) / last.price * 100.0).abs();
            if change_pct < threshold {
                return false;
            }
        }
    }

    if let Some(floor) = filters.volume_floor {
        if current.volume < floor {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::StockDataApi;
    use crate::cache::{CachePolicy, MarketCache};
    use crate::config::BatchSettings;
    use crate::errors::GatewayResult;
    use crate::types::{FinancialReport, NewsArticle, PriceBar, ReportPeriod};
    use async_trait::async_trait;
    use parking_lot::RwLock;

    // Upstream whose quotes can be changed between passes
    struct ScriptedApi {
        quotes: RwLock<HashMap<String, Quote>>,
    }

    impl ScriptedApi {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                quotes: RwLock::new(HashMap::new()),
            })
        }

        fn set(&self, symbol: &str, price: f64, volume: u64) {
            self.quotes
                .write()
                .insert(symbol.to_string(), Quote::simple(symbol, price, volume));
        }
    }

    #[async_trait]
    impl StockDataApi for ScriptedApi {
        async fn fetch_quote(&self, symbol: &str) -> GatewayResult<Quote> {
            self.quotes.read().get(symbol).cloned().ok_or_else(|| {
                crate::errors::GatewayError::upstream("scripted", "unknown symbol")
            })
        }

        async fn fetch_quotes(&self, symbols: &[String]) -> GatewayResult<Vec<Quote>> {
            let quotes = self.quotes.read();
            Ok(symbols
                .iter()
                .filter_map(|s| quotes.get(s).cloned())
                .collect())
        }

        async fn fetch_historical(
            &self,
            _symbol: &str,
            _period: &str,
        ) -> GatewayResult<Vec<PriceBar>> {
            Ok(Vec::new())
        }

        async fn fetch_financials(
            &self,
            _symbol: &str,
            _period: ReportPeriod,
        ) -> GatewayResult<FinancialReport> {
            Err(crate::errors::GatewayError::upstream("scripted", "none"))
        }

        async fn fetch_news(&self, _symbol: &str) -> GatewayResult<Vec<NewsArticle>> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> HashMap<String, bool> {
            HashMap::new()
        }
    }

    fn service(api: Arc<ScriptedApi>) -> Arc<RealTimeDataService> {
        // Zero quote TTL so every pass sees fresh upstream data
        let policy = CachePolicy {
            quote_ttl: Duration::ZERO,
            ..CachePolicy::default()
        };
        let cache = Arc::new(MarketCache::new(1000, policy));
        let batch = Arc::new(BatchProcessor::new(
            cache,
            BatchSettings {
                retry_attempts: 1,
                retry_base_delay_ms: 1,
                ..BatchSettings::default()
            },
        ));
        Arc::new(RealTimeDataService::new(
            batch,
            api,
            StreamSettings::default(),
        ))
    }

    fn collector() -> (UpdateCallback, Arc<Mutex<Vec<RealTimeUpdate>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: UpdateCallback = Arc::new(move |update| sink.lock().push(update));
        (callback, seen)
    }

    #[tokio::test]
    async fn subscribe_pushes_initial_data() {
        let api = ScriptedApi::new();
        api.set("AAPL", 100.0, 1_000);
        let service = service(api);

        let (callback, seen) = collector();
        service
            .subscribe("sub1", vec!["aapl".to_string()], Default::default(), callback)
            .await;

        let updates = seen.lock();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].kind, UpdateKind::Initial);
        assert_eq!(updates[0].symbol, "AAPL");
        assert_eq!(service.snapshot.lock().len(), 1);
    }

    #[tokio::test]
    async fn unchanged_prices_are_suppressed() {
        let api = ScriptedApi::new();
        api.set("AAPL", 100.0, 1_000);
        let service = service(api.clone());

        let (callback, seen) = collector();
        service
            .subscribe("sub1", vec!["AAPL".to_string()], Default::default(), callback)
            .await;
        seen.lock().clear();

        // Move below the epsilon
        api.set("AAPL", 100.005, 1_000);
        service.run_update_pass().await;
        assert!(seen.lock().is_empty());

        api.set("AAPL", 101.0, 1_000);
        service.run_update_pass().await;
        let updates = seen.lock();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].kind, UpdateKind::Price);
        assert_eq!(updates[0].quote.price, 101.0);
    }

    #[tokio::test]
    async fn snapshot_advances_even_when_filters_suppress() {
        let api = ScriptedApi::new();
        api.set("AAPL", 100.0, 1_000);
        let service = service(api.clone());

        let (callback, seen) = collector();
        let filters = SubscriptionFilters {
            price_change_threshold_pct: Some(50.0), // nothing passes
            volume_floor: None,
        };
        service
            .subscribe("sub1", vec!["AAPL".to_string()], filters, callback)
            .await;
        seen.lock().clear();

        api.set("AAPL", 105.0, 1_000);
        service.run_update_pass().await;

        assert!(seen.lock().is_empty());
        assert_eq!(service.snapshot.lock()["AAPL"].price, 105.0);
    }

    #[tokio::test]
    async fn price_threshold_passes_larger_moves() {
        let api = ScriptedApi::new();
        api.set("AAPL", 100.0, 1_000);
        let service = service(api.clone());

        let (callback, seen) = collector();
        let filters = SubscriptionFilters {
            price_change_threshold_pct: Some(2.0),
            volume_floor: None,
        };
        service
            .subscribe("sub1", vec!["AAPL".to_string()], filters, callback)
            .await;
        seen.lock().clear();

        // 0.5% move stays under the threshold
        api.set("AAPL", 100.5, 1_000);
        service.run_update_pass().await;
        assert!(seen.lock().is_empty());

        // ~2.5% from the advanced snapshot (100.5) is above it
        api.set("AAPL", 103.0, 1_000);
        service.run_update_pass().await;
        let updates = seen.lock();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].kind, UpdateKind::Price);
        assert_eq!(updates[0].quote.price, 103.0);
    }

    #[tokio::test]
    async fn volume_floor_filter() {
        let api = ScriptedApi::new();
        api.set("THIN", 10.0, 100);
        let service = service(api.clone());

        let (callback, seen) = collector();
        let filters = SubscriptionFilters {
            price_change_threshold_pct: None,
            volume_floor: Some(1_000),
        };
        service
            .subscribe("sub1", vec!["THIN".to_string()], filters, callback)
            .await;
        seen.lock().clear();

        api.set("THIN", 12.0, 100);
        service.run_update_pass().await;
        assert!(seen.lock().is_empty());

        api.set("THIN", 14.0, 5_000);
        service.run_update_pass().await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_callbacks() {
        let api = ScriptedApi::new();
        api.set("AAPL", 100.0, 1_000);
        let service = service(api.clone());

        let (callback, seen) = collector();
        service
            .subscribe("sub1", vec!["AAPL".to_string()], Default::default(), callback)
            .await;
        seen.lock().clear();

        assert!(service.unsubscribe("sub1"));
        assert!(!service.unsubscribe("sub1"));

        api.set("AAPL", 200.0, 1_000);
        service.run_update_pass().await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn price_spike_alert_between_scans() {
        let api = ScriptedApi::new();
        api.set("AAPL", 100.0, 1_000);
        let service = service(api.clone());

        let alerts = Arc::new(Mutex::new(Vec::new()));
        let sink = alerts.clone();
        service.subscribe_to_alerts(Arc::new(move |alert| sink.lock().push(alert)));

        let (callback, _seen) = collector();
        service
            .subscribe("sub1", vec!["AAPL".to_string()], Default::default(), callback)
            .await;

        // First scan establishes the baseline
        service.run_alert_scan();
        assert!(alerts.lock().is_empty());

        api.set("AAPL", 110.0, 1_000);
        service.run_update_pass().await;
        service.run_alert_scan();

        let captured = alerts.lock();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].kind, AlertKind::PriceSpike);
        assert_eq!(captured[0].severity, AlertSeverity::High);
        assert!((captured[0].change_percent - 10.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn volume_surge_alert() {
        let api = ScriptedApi::new();
        api.set("AAPL", 100.0, 1_000);
        let service = service(api.clone());

        let alerts = Arc::new(Mutex::new(Vec::new()));
        let sink = alerts.clone();
        service.subscribe_to_alerts(Arc::new(move |alert| sink.lock().push(alert)));

        let (callback, _seen) = collector();
        service
            .subscribe("sub1", vec!["AAPL".to_string()], Default::default(), callback)
            .await;
        service.run_alert_scan();

        // Volume doubles, price barely moves
        api.set("AAPL", 100.5, 2_500);
        service.run_update_pass().await;
        service.run_alert_scan();

        let captured = alerts.lock();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].kind, AlertKind::VolumeSurge);
        assert_eq!(captured[0].severity, AlertSeverity::High);
    }

    #[tokio::test]
    async fn stop_clears_state() {
        let api = ScriptedApi::new();
        api.set("AAPL", 100.0, 1_000);
        let service = service(api);

        let (callback, _seen) = collector();
        service
            .subscribe("sub1", vec!["AAPL".to_string()], Default::default(), callback)
            .await;
        service.subscribe_to_alerts(Arc::new(|_| {}));

        service.stop();

        let stats = service.stats();
        assert_eq!(stats.active_subscriptions, 0);
        assert_eq!(stats.snapshot_size, 0);
        assert!(service.alert_listeners.lock().is_empty());
    }

    #[tokio::test]
    async fn stats_reflect_activity() {
        let api = ScriptedApi::new();
        api.set("AAPL", 100.0, 1_000);
        api.set("MSFT", 400.0, 2_000);
        let service = service(api.clone());

        let (callback, _seen) = collector();
        service
            .subscribe(
                "sub1",
                vec!["AAPL".to_string(), "MSFT".to_string()],
                Default::default(),
                callback.clone(),
            )
            .await;
        service
            .subscribe("sub2", vec!["AAPL".to_string()], Default::default(), callback)
            .await;

        api.set("AAPL", 150.0, 1_000);
        service.run_update_pass().await;

        let stats = service.stats();
        assert_eq!(stats.active_subscriptions, 2);
        assert_eq!(stats.distinct_symbols, 2);
        assert_eq!(stats.snapshot_size, 2);
        // AAPL moved and is watched by both subscriptions
        assert_eq!(stats.updates_dispatched, 2);
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
