/// Configuration for marketgate
///
/// All tunables live here, defined once with embedded defaults via the
/// `config_struct!` macro. A partial TOML file overrides only the fields it
/// names; a missing file means pure defaults.

pub mod macros;

use crate::config_struct;
use crate::errors::ConfigurationError;
use std::path::Path;

// ============================================================================
// GATEWAY CONFIGURATION
// ============================================================================

config_struct! {
    /// Request pipeline configuration
    pub struct GatewaySettings {
        /// Serve from cache when possible
        enable_caching: bool = true,

        /// Enforce per-client rate limits
        enable_rate_limit: bool = true,

        /// TTL used when a call site does not pick a cache class (seconds)
        default_cache_ttl_secs: u64 = 300,

        /// Hard deadline for a single upstream operation (milliseconds)
        request_timeout_ms: u64 = 30_000,
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

config_struct! {
    /// In-memory cache sizing and TTL classes per data kind
    pub struct CacheSettings {
        /// Maximum number of entries before eviction kicks in
        max_entries: usize = 1000,

        /// How often the maintenance service sweeps expired entries (seconds)
        cleanup_interval_secs: u64 = 300,

        // TTL classes - a configuration table, not separate code paths
        quote_ttl_secs: u64 = 60,
        historical_ttl_secs: u64 = 3600,
        news_ttl_secs: u64 = 600,
        sentiment_ttl_secs: u64 = 7200,
        dataset_ttl_secs: u64 = 1800,
    }
}

// ============================================================================
// RATE LIMIT CONFIGURATION
// ============================================================================

config_struct! {
    /// Per-client sliding window admission
    pub struct RateLimitSettings {
        /// Window length (milliseconds)
        window_ms: u64 = 60_000,

        /// Maximum admitted requests per identifier per window
        max_requests: usize = 100,
    }
}

// ============================================================================
// BATCH CONFIGURATION
// ============================================================================

config_struct! {
    /// Concurrency-bounded batch fetching
    pub struct BatchSettings {
        /// Maximum simultaneous in-flight fetches
        max_concurrency: usize = 10,

        /// Attempts per item before recording a failure
        retry_attempts: u32 = 3,

        /// Base backoff delay, doubled per attempt (milliseconds)
        retry_base_delay_ms: u64 = 1000,

        /// Symbols that are known-invalid and never fetched
        denylist: Vec<String> = Vec::new(),

        /// Substrings marking a symbol as unlisted (e.g. "(unlisted)")
        denylist_markers: Vec<String> = vec!["(unlisted)".to_string(), "(private)".to_string()],
    }
}

// ============================================================================
// STREAM CONFIGURATION
// ============================================================================

config_struct! {
    /// Real-time polling and alerting
    pub struct StreamSettings {
        /// Main update loop interval (seconds); alert scan runs at a quarter of this
        update_interval_secs: u64 = 60,

        /// Emit global market alerts
        enable_alerts: bool = true,

        /// Price move (percent) that raises a PriceSpike alert
        price_change_threshold_pct: f64 = 2.0,

        /// Volume change (percent) that raises a VolumeSurge alert
        volume_change_threshold_pct: f64 = 50.0,

        /// Absolute price delta below which a move is considered noise
        price_epsilon: f64 = 0.01,
    }
}

// ============================================================================
// UPSTREAM SOURCE CONFIGURATION
// ============================================================================

config_struct! {
    /// Stock data provider endpoints (primary + fallback for quotes)
    pub struct StockSourceSettings {
        enabled: bool = true,
        primary_base_url: String = "https://quotes.primary.example.com/v8".to_string(),
        fallback_base_url: String = "https://data.fallback.example.com/query".to_string(),
        /// Environment variable holding the fallback provider API key
        api_key_env: String = "MARKETGATE_STOCK_API_KEY".to_string(),
        rate_limit_per_minute: usize = 30,
        timeout_seconds: u64 = 10,
    }
}

config_struct! {
    /// Public dataset provider endpoint
    pub struct PublicDataSourceSettings {
        enabled: bool = true,
        base_url: String = "https://opendata.example.com/api".to_string(),
        api_key_env: String = "MARKETGATE_PUBLIC_DATA_API_KEY".to_string(),
        rate_limit_per_minute: usize = 60,
        timeout_seconds: u64 = 10,
    }
}

config_struct! {
    /// All upstream collaborators
    pub struct SourcesSettings {
        stock: StockSourceSettings = StockSourceSettings::default(),
        public_data: PublicDataSourceSettings = PublicDataSourceSettings::default(),
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration, one section per subsystem
    pub struct Config {
        gateway: GatewaySettings = GatewaySettings::default(),
        cache: CacheSettings = CacheSettings::default(),
        rate_limit: RateLimitSettings = RateLimitSettings::default(),
        batch: BatchSettings = BatchSettings::default(),
        stream: StreamSettings = StreamSettings::default(),
        sources: SourcesSettings = SourcesSettings::default(),
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let raw =
            std::fs::read_to_string(path).map_err(|_| ConfigurationError::FileNotFound {
                path: path.display().to_string(),
            })?;

        let config: Config =
            toml::from_str(&raw).map_err(|e| ConfigurationError::ParseError {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would wedge the pipeline at runtime
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.batch.max_concurrency == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "batch.max_concurrency".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.gateway.request_timeout_ms == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "gateway.request_timeout_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "rate_limit.max_requests".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.stream.update_interval_secs == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "stream.update_interval_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
