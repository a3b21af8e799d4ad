/// Response envelope returned by every gateway operation
///
/// Callers always get a `GatewayResponse`, never a raw error. Either `data`
/// or `error` is populated, and metadata carries provenance so clients can
/// tell cached answers from live ones.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Cache,
    Api,
    System,
    Gateway,
}

/// Closed set of error codes exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RateLimitExceeded,
    OperationFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Rate limit state echoed back on rejections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub remaining: usize,
    pub reset_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub data_source: DataSource,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub metadata: ResponseMetadata,
}

impl<T> GatewayResponse<T> {
    pub fn ok(data: T, metadata: ResponseMetadata) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata,
        }
    }

    pub fn err(
        code: ErrorCode,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
        metadata: ResponseMetadata,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorInfo {
                code,
                message: message.into(),
                details,
            }),
            metadata,
        }
    }
}

/// Process-unique request identifier
pub fn generate_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_serialize_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::RateLimitExceeded).unwrap(),
            "\"RATE_LIMIT_EXCEEDED\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::OperationFailed).unwrap(),
            "\"OPERATION_FAILED\""
        );
    }

    #[test]
    fn request_ids_are_unique_and_prefixed() {
        let a = generate_request_id();
        let b = generate_request_id();
        assert!(a.starts_with("req_"));
        assert_ne!(a, b);
    }

    #[test]
    fn envelope_omits_absent_fields() {
        let metadata = ResponseMetadata {
            request_id: generate_request_id(),
            timestamp: Utc::now(),
            processing_time_ms: 5,
            data_source: DataSource::Api,
            cached: false,
            rate_limit: None,
        };
        let response: GatewayResponse<u32> = GatewayResponse::ok(7, metadata);
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("error").is_none());
        assert!(json["metadata"].get("rate_limit").is_none());
        assert_eq!(json["data"], 7);
    }
}
