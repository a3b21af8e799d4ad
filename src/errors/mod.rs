/// Structured error handling for marketgate
///
/// One enum per concern, composed under a single `GatewayError` so upstream
/// clients, the cache layer, and the gateway share a common error channel.
/// The gateway itself never lets these escape to callers - everything is
/// folded into a response envelope at the gateway boundary.

// =============================================================================
// MAIN ERROR TYPE
// =============================================================================

#[derive(Debug, Clone)]
pub enum GatewayError {
    // Network connectivity errors
    Network(NetworkError),

    // Upstream provider failures (bad payloads, provider-side errors)
    Upstream(UpstreamError),

    // Configuration errors
    Configuration(ConfigurationError),

    // Operation exceeded the configured deadline
    Timeout { operation: String, timeout_ms: u64 },

}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Network(e) => write!(f, "Network Error: {}", e),
            GatewayError::Upstream(e) => write!(f, "Upstream Error: {}", e),
            GatewayError::Configuration(e) => write!(f, "Configuration Error: {}", e),
            GatewayError::Timeout {
                operation,
                timeout_ms,
            } => {
                write!(f, "Request timeout: {} exceeded {}ms", operation, timeout_ms)
            }
        }
    }
}

impl std::error::Error for GatewayError {}

impl GatewayError {
    /// Shorthand for an upstream failure with a plain message
    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::Upstream(UpstreamError::Provider {
            provider: provider.into(),
            message: message.into(),
        })
    }

    /// Shorthand for a generic network failure
    pub fn network(message: impl Into<String>) -> Self {
        GatewayError::Network(NetworkError::Generic {
            message: message.into(),
        })
    }
}

// =============================================================================
// NETWORK ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum NetworkError {
    ConnectionTimeout {
        endpoint: String,
        timeout_ms: u64,
    },
    HttpStatusError {
        endpoint: String,
        status: u16,
        body: Option<String>,
    },
    Generic {
        message: String,
    },
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::ConnectionTimeout {
                endpoint,
                timeout_ms,
            } => {
                write!(
                    f,
                    "Connection timeout to {} after {}ms",
                    endpoint, timeout_ms
                )
            }
            NetworkError::HttpStatusError {
                endpoint,
                status,
                body,
            } => {
                write!(
                    f,
                    "HTTP {} from {}: {}",
                    status,
                    endpoint,
                    body.as_deref().unwrap_or("No body")
                )
            }
            NetworkError::Generic { message } => write!(f, "{}", message),
        }
    }
}

// =============================================================================
// UPSTREAM PROVIDER ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum UpstreamError {
    /// Provider returned an error or unusable payload
    Provider { provider: String, message: String },

    /// Every configured provider failed for this request
    AllProvidersFailed {
        symbol: String,
        primary: String,
        fallback: String,
    },

    /// Response body did not match the expected schema
    MalformedResponse { provider: String, detail: String },

    /// Symbol is not served by any configured provider
    SymbolNotFound { symbol: String },
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamError::Provider { provider, message } => {
                write!(f, "{}: {}", provider, message)
            }
            UpstreamError::AllProvidersFailed {
                symbol,
                primary,
                fallback,
            } => {
                write!(
                    f,
                    "All providers failed for {}: primary: {}, fallback: {}",
                    symbol, primary, fallback
                )
            }
            UpstreamError::MalformedResponse { provider, detail } => {
                write!(f, "Malformed response from {}: {}", provider, detail)
            }
            UpstreamError::SymbolNotFound { symbol } => {
                write!(f, "Symbol not found: {}", symbol)
            }
        }
    }
}

// =============================================================================
// CONFIGURATION ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum ConfigurationError {
    FileNotFound { path: String },
    ParseError { path: String, detail: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::FileNotFound { path } => {
                write!(f, "Configuration file not found: {}", path)
            }
            ConfigurationError::ParseError { path, detail } => {
                write!(f, "Failed to parse {}: {}", path, detail)
            }
            ConfigurationError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Convenience alias used by upstream clients and the batch layer
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_mentions_timeout() {
        let err = GatewayError::Timeout {
            operation: "fetch_quote".to_string(),
            timeout_ms: 200,
        };
        let text = err.to_string();
        assert!(text.contains("Request timeout"));
        assert!(text.contains("200ms"));
    }

    #[test]
    fn upstream_shorthand() {
        let err = GatewayError::upstream("primary", "HTTP 500");
        assert!(err.to_string().contains("primary: HTTP 500"));
    }
}
