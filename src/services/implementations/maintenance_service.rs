/// Periodic housekeeping: cache sweeps and rate limiter pruning
use crate::cache::MarketCache;
use crate::config::Config;
use crate::gateway::SlidingWindowLimiter;
use crate::logger::{self, LogTag};
use crate::services::Service;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub struct MaintenanceService {
    cache: Arc<MarketCache>,
    limiter: Arc<SlidingWindowLimiter>,
    cleanup_interval: Duration,
    limiter_interval: Duration,
}

impl MaintenanceService {
    pub fn new(cache: Arc<MarketCache>, limiter: Arc<SlidingWindowLimiter>, config: &Config) -> Self {
        Self {
            cache,
            limiter,
            cleanup_interval: Duration::from_secs(config.cache.cleanup_interval_secs),
            limiter_interval: Duration::from_millis(config.rate_limit.window_ms),
        }
    }
}

#[async_trait]
impl Service for MaintenanceService {
    fn name(&self) -> &'static str {
        "maintenance"
    }

    fn priority(&self) -> i32 {
        10 // Start early, stop late
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        let cache = self.cache.clone();
        let cleanup_interval = self.cleanup_interval;
        let cache_shutdown = shutdown.clone();
        let cache_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cache_shutdown.notified() => break,
                    _ = tokio::time::sleep(cleanup_interval) => {
                        let removed = cache.cleanup();
                        if removed > 0 {
                            logger::debug(
                                LogTag::Cache,
                                &format!("Swept {} expired cache entries", removed),
                            );
                        }
                    }
                }
            }
        });

        let limiter = self.limiter.clone();
        let limiter_interval = self.limiter_interval;
        let limiter_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = tokio::time::sleep(limiter_interval) => {
                        let dropped = limiter.cleanup();
                        if dropped > 0 {
                            logger::verbose(
                                LogTag::Gateway,
                                &format!("Dropped {} idle rate limit windows", dropped),
                            );
                        }
                    }
                }
            }
        });

        Ok(vec![cache_handle, limiter_handle])
    }
}
