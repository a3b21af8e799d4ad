/// Base HTTP client with upstream pacing
use crate::errors::{GatewayError, GatewayResult, NetworkError};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Paces requests to one upstream provider
///
/// Serializes requests (one in flight) and enforces a minimum interval
/// derived from the provider's per-minute allowance. This is pacing toward
/// upstreams; client-facing admission lives in the gateway's sliding window
/// limiter.
pub struct RequestPacer {
    semaphore: Arc<Semaphore>,
    last_request: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl RequestPacer {
    pub fn new(max_per_minute: usize) -> Self {
        let min_interval = if max_per_minute > 0 {
            Duration::from_secs_f64(60.0 / max_per_minute as f64)
        } else {
            Duration::ZERO
        };

        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            last_request: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    /// Wait until the next request may go out
    pub async fn acquire(&self) -> GatewayResult<PacerGuard> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| GatewayError::network(format!("Pacer closed: {}", e)))?;

        if !self.min_interval.is_zero() {
            let mut last = self.last_request.lock().await;
            if let Some(last_time) = *last {
                let elapsed = last_time.elapsed();
                if elapsed < self.min_interval {
                    tokio::time::sleep(self.min_interval - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        Ok(PacerGuard { _permit: permit })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// RAII guard returned by [`RequestPacer::acquire`]
pub struct PacerGuard {
    _permit: OwnedSemaphorePermit,
}

/// HTTP client wrapper with a fixed timeout
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout_secs: u64) -> GatewayResult<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("marketgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// GET a URL and decode the body as JSON
    pub async fn get_json(&self, url: &str) -> GatewayResult<serde_json::Value> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Network(NetworkError::ConnectionTimeout {
                    endpoint: url.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            } else {
                GatewayError::network(format!("Request to {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(GatewayError::Network(NetworkError::HttpStatusError {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body,
            }));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::network(format!("Invalid JSON from {}: {}", url, e)))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacer_interval_from_per_minute_budget() {
        let pacer = RequestPacer::new(30);
        assert_eq!(pacer.min_interval(), Duration::from_secs(2));

        let unthrottled = RequestPacer::new(0);
        assert_eq!(unthrottled.min_interval(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn pacer_spaces_consecutive_requests() {
        let pacer = RequestPacer::new(60); // 1s apart

        let start = tokio::time::Instant::now();
        drop(pacer.acquire().await.unwrap());
        drop(pacer.acquire().await.unwrap());

        assert!(start.elapsed() >= Duration::from_millis(900));
    }
}
