/// Periodic one-line operational summary in the log
use crate::batch::BatchProcessor;
use crate::cache::MarketCache;
use crate::gateway::GatewayMetrics;
use crate::logger::{self, LogTag};
use crate::services::Service;
use crate::stream::RealTimeDataService;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

const SUMMARY_INTERVAL: Duration = Duration::from_secs(300);

pub struct MonitorService {
    metrics: Arc<GatewayMetrics>,
    cache: Arc<MarketCache>,
    batch: Arc<BatchProcessor>,
    stream: Arc<RealTimeDataService>,
}

impl MonitorService {
    pub fn new(
        metrics: Arc<GatewayMetrics>,
        cache: Arc<MarketCache>,
        batch: Arc<BatchProcessor>,
        stream: Arc<RealTimeDataService>,
    ) -> Self {
        Self {
            metrics,
            cache,
            batch,
            stream,
        }
    }
}

#[async_trait]
impl Service for MonitorService {
    fn name(&self) -> &'static str {
        "monitor"
    }

    fn priority(&self) -> i32 {
        90 // Last in, first out
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        let metrics = self.metrics.clone();
        let cache = self.cache.clone();
        let batch = self.batch.clone();
        let stream = self.stream.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = tokio::time::sleep(SUMMARY_INTERVAL) => {
                        let gw = metrics.snapshot();
                        let batch_stats = batch.stats();
                        let stream_stats = stream.stats();
                        logger::info(
                            LogTag::System,
                            &format!(
                                "requests={} errors={:.1}% cache_hit={:.1}% entries={} batch_jobs={} subs={} alerts={}",
                                gw.requests,
                                gw.error_rate_pct,
                                gw.cache_hit_rate_pct,
                                cache.len(),
                                batch_stats.total_jobs,
                                stream_stats.active_subscriptions,
                                stream_stats.alerts_sent,
                            ),
                        );
                    }
                }
            }
        });

        Ok(vec![handle])
    }
}
