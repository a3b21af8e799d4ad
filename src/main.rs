use anyhow::{Context, Result};
use marketgate::apis::{HttpPublicDataApi, HttpStockDataApi, PublicDataApi, StockDataApi};
use marketgate::arguments::Arguments;
use marketgate::batch::BatchProcessor;
use marketgate::cache::{CachePolicy, MarketCache};
use marketgate::config::Config;
use marketgate::gateway::{ApiGateway, GatewayMetrics, SlidingWindowLimiter};
use marketgate::logger::{self, LogTag};
use marketgate::services::implementations::{MaintenanceService, MonitorService, StreamService};
use marketgate::services::ServiceManager;
use marketgate::stream::RealTimeDataService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse_args();
    logger::init(args.verbose, &args.debug_modules);

    let config = if args.config.exists() {
        Config::load(&args.config)
            .with_context(|| format!("Failed to load {}", args.config.display()))?
    } else {
        logger::info(
            LogTag::Config,
            &format!(
                "No config file at {}, using defaults",
                args.config.display()
            ),
        );
        Config::default()
    };

    // Wire the component graph explicitly; everything downstream borrows
    // these Arcs rather than reaching for globals
    let cache = Arc::new(MarketCache::new(
        config.cache.max_entries,
        CachePolicy::from_settings(&config.cache),
    ));
    let limiter = Arc::new(SlidingWindowLimiter::new(
        Duration::from_millis(config.rate_limit.window_ms),
        config.rate_limit.max_requests,
    ));
    let metrics = Arc::new(GatewayMetrics::new());

    let stock_api: Arc<dyn StockDataApi> = Arc::new(
        HttpStockDataApi::new(&config.sources.stock)
            .context("Failed to build stock data client")?,
    );
    let public_data_api: Arc<dyn PublicDataApi> = Arc::new(
        HttpPublicDataApi::new(&config.sources.public_data)
            .context("Failed to build public data client")?,
    );

    let batch = Arc::new(BatchProcessor::new(cache.clone(), config.batch.clone()));
    let stream = Arc::new(RealTimeDataService::new(
        batch.clone(),
        stock_api.clone(),
        config.stream.clone(),
    ));
    let gateway = Arc::new(ApiGateway::new(
        cache.clone(),
        limiter.clone(),
        metrics.clone(),
        stock_api,
        public_data_api,
        batch.clone(),
        config.gateway.clone(),
    ));

    let mut manager = ServiceManager::new(config.clone());
    manager.register(Box::new(MaintenanceService::new(
        cache.clone(),
        limiter,
        &config,
    )));
    manager.register(Box::new(StreamService::new(stream.clone())));
    manager.register(Box::new(MonitorService::new(
        metrics, cache, batch, stream,
    )));

    manager
        .start_all()
        .await
        .map_err(|e| anyhow::anyhow!("Service startup failed: {}", e))?;

    let health = gateway.get_health_status().await;
    if let Some(status) = health.data {
        logger::info(
            LogTag::System,
            &format!(
                "Gateway up (v{}) stock_sources_healthy={} public_data_healthy={}",
                status.version, status.stock_sources.healthy, status.public_data_sources.healthy
            ),
        );
    }

    let shutdown = Arc::new(Notify::new());
    let shutdown_trigger = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_trigger.notify_waiters();
    })
    .context("Failed to install Ctrl-C handler")?;

    logger::info(LogTag::System, "marketgate running, Ctrl-C to stop");
    shutdown.notified().await;

    logger::info(LogTag::System, "Shutting down...");
    manager
        .stop_all()
        .await
        .map_err(|e| anyhow::anyhow!("Service shutdown failed: {}", e))?;

    Ok(())
}
