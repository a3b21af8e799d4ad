/// Concurrency-bounded batch fetching
///
/// The processor turns a list of symbols into per-symbol results without
/// letting one failure poison the batch. Cached symbols never spend
/// concurrency budget, denylisted symbols fail immediately, and everything
/// else runs under a semaphore with retry and exponential backoff.
use crate::cache::MarketCache;
use crate::config::BatchSettings;
use crate::errors::GatewayResult;
use crate::logger::{self, LogTag};
use crate::types::Quote;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Outcome of one item in a batch
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BatchJobResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl<T> BatchJobResult<T> {
    fn ok(data: T, duration_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            duration_ms,
        }
    }

    fn err(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            duration_ms,
        }
    }
}

/// Rolling processor statistics
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BatchStats {
    pub total_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub average_latency_ms: f64,
    pub throughput_per_sec: f64,
}

#[derive(Default)]
struct StatsInner {
    total_jobs: u64,
    completed_jobs: u64,
    failed_jobs: u64,
    total_latency_ms: u64,
    busy: Duration,
}

pub struct BatchProcessor {
    cache: Arc<MarketCache>,
    settings: BatchSettings,
    semaphore: Mutex<Arc<Semaphore>>,
    stats: Mutex<StatsInner>,
}

impl BatchProcessor {
    pub fn new(cache: Arc<MarketCache>, settings: BatchSettings) -> Self {
        let semaphore = Arc::new(Semaphore::new(settings.max_concurrency));
        Self {
            cache,
            settings,
            semaphore: Mutex::new(semaphore),
            stats: Mutex::new(StatsInner::default()),
        }
    }

    /// Fetch quotes for many symbols, cache-first, bounded, retried
    ///
    /// Always returns one entry per distinct input symbol; a failed symbol
    /// yields a failure result, never an error from this call.
    pub async fn fetch_quotes<F, Fut>(
        &self,
        symbols: &[String],
        fetch: F,
    ) -> HashMap<String, BatchJobResult<Quote>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = GatewayResult<Quote>>,
    {
        let started = Instant::now();
        let mut results: HashMap<String, BatchJobResult<Quote>> = HashMap::new();
        let mut to_fetch: Vec<String> = Vec::new();

        for symbol in symbols {
            let symbol = symbol.trim().to_uppercase();
            if symbol.is_empty() || results.contains_key(&symbol) {
                continue;
            }

            if self.is_denylisted(&symbol) {
                results.insert(symbol, BatchJobResult::err("Symbol is not fetchable", 0));
                continue;
            }

            if let Some(quote) = self.cache.get_quote(&symbol) {
                results.insert(symbol, BatchJobResult::ok(quote, 0));
                continue;
            }

            to_fetch.push(symbol);
        }

        let cached = results.values().filter(|r| r.success).count();
        logger::debug(
            LogTag::Batch,
            &format!(
                "Batch of {}: {} cached, {} to fetch",
                symbols.len(),
                cached,
                to_fetch.len()
            ),
        );

        let fetched = self.run_batch(to_fetch, |symbol| fetch(symbol)).await;
        for (symbol, result) in fetched {
            if let Some(quote) = &result.data {
                self.cache.set_quote(quote);
            }
            results.insert(symbol, result);
        }

        self.record_batch(&results, started.elapsed());
        results
    }

    /// Run a worker over many items with the configured concurrency bound
    ///
    /// Each item gets retry with exponential backoff; failures are captured
    /// per item. Generic so callers other than the quote path can reuse it.
    pub async fn run_batch<I, T, W, Fut>(&self, items: Vec<I>, worker: W) -> Vec<(I, BatchJobResult<T>)>
    where
        I: Clone,
        W: Fn(I) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let semaphore = self.semaphore.lock().clone();

        let jobs = items.into_iter().map(|item| {
            let semaphore = semaphore.clone();
            let worker = &worker;
            async move {
                let started = Instant::now();
                // Closed only on process teardown
                let Ok(_permit) = semaphore.acquire().await else {
                    return (
                        item.clone(),
                        BatchJobResult::err("Batch processor shut down", 0),
                    );
                };

                let result = match self.execute_with_retry(|| worker(item.clone())).await {
                    Ok(data) => BatchJobResult::ok(data, started.elapsed().as_millis() as u64),
                    Err(message) => {
                        BatchJobResult::err(message, started.elapsed().as_millis() as u64)
                    }
                };
                (item, result)
            }
        });

        futures::future::join_all(jobs).await
    }

    /// Retry with exponential backoff and a little jitter
    async fn execute_with_retry<T, O, Fut>(&self, operation: O) -> Result<T, String>
    where
        O: Fn() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let max_attempts = self.settings.retry_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match operation().await {
                Ok(data) => return Ok(data),
                Err(err) => {
                    last_error = err.to_string();
                    if attempt == max_attempts {
                        break;
                    }

                    let backoff =
                        self.settings.retry_base_delay_ms * 2u64.pow(attempt - 1);
                    let jitter = rand::thread_rng().gen_range(0..=backoff / 4);
                    logger::debug(
                        LogTag::Batch,
                        &format!(
                            "Attempt {}/{} failed ({}), retrying in {}ms",
                            attempt,
                            max_attempts,
                            last_error,
                            backoff + jitter
                        ),
                    );
                    tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
                }
            }
        }

        Err(last_error)
    }

    fn is_denylisted(&self, symbol: &str) -> bool {
        self.settings
            .denylist
            .iter()
            .any(|denied| symbol.eq_ignore_ascii_case(denied))
            || self
                .settings
                .denylist_markers
                .iter()
                .any(|marker| symbol.to_lowercase().contains(&marker.to_lowercase()))
    }

    /// Swap the concurrency bound; in-flight batches keep the old one
    pub fn configure_concurrency(&self, max_concurrency: usize) {
        let bound = max_concurrency.max(1);
        *self.semaphore.lock() = Arc::new(Semaphore::new(bound));
        logger::info(
            LogTag::Batch,
            &format!("Batch concurrency set to {}", bound),
        );
    }

    pub fn stats(&self) -> BatchStats {
        let inner = self.stats.lock();
        BatchStats {
            total_jobs: inner.total_jobs,
            completed_jobs: inner.completed_jobs,
            failed_jobs: inner.failed_jobs,
            average_latency_ms: if inner.completed_jobs > 0 {
                inner.total_latency_ms as f64 / inner.completed_jobs as f64
            } else {
                0.0
            },
            throughput_per_sec: {
                let secs = inner.busy.as_secs_f64();
                if secs > 0.0 {
                    inner.completed_jobs as f64 / secs
                } else {
                    0.0
                }
            },
        }
    }

    fn record_batch(&self, results: &HashMap<String, BatchJobResult<Quote>>, elapsed: Duration) {
        let mut inner = self.stats.lock();
        for result in results.values() {
            inner.total_jobs += 1;
            if result.success {
                inner.completed_jobs += 1;
                inner.total_latency_ms += result.duration_ms;
            } else {
                inner.failed_jobs += 1;
            }
        }
        inner.busy += elapsed;
    }
}
