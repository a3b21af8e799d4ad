pub mod config;
pub mod manager;
pub mod market;

pub use config::CachePolicy;
pub use manager::{CacheMetrics, TtlCache};
pub use market::MarketCache;
