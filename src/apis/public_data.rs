/// Public open-data HTTP client
///
/// Datasets differ in shape per endpoint, so rows are normalized into
/// `DatasetRecord` field maps instead of one struct per dataset.
use crate::apis::client::{HttpClient, RequestPacer};
use crate::apis::PublicDataApi;
use crate::config::PublicDataSourceSettings;
use crate::errors::{GatewayError, GatewayResult, UpstreamError};
use crate::types::DatasetRecord;
use async_trait::async_trait;
use std::collections::HashMap;

const PROVIDER: &str = "public_data";

pub struct HttpPublicDataApi {
    http: HttpClient,
    pacer: RequestPacer,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPublicDataApi {
    pub fn new(settings: &PublicDataSourceSettings) -> GatewayResult<Self> {
        Ok(Self {
            http: HttpClient::new(settings.timeout_seconds)?,
            pacer: RequestPacer::new(settings.rate_limit_per_minute),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: std::env::var(&settings.api_key_env).ok(),
        })
    }

    fn build_url(&self, name: &str, params: &HashMap<String, String>) -> String {
        let mut url = format!("{}/{}?resultType=json", self.base_url, name);
        if let Some(key) = &self.api_key {
            url.push_str(&format!("&serviceKey={}", key));
        }
        // Deterministic ordering keeps urls stable for logs and tests
        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort_by_key(|(k, _)| k.as_str());
        for (key, value) in sorted {
            url.push_str(&format!("&{}={}", key, value));
        }
        url
    }
}

#[async_trait]
impl PublicDataApi for HttpPublicDataApi {
    async fn fetch_dataset(
        &self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> GatewayResult<Vec<DatasetRecord>> {
        let _guard = self.pacer.acquire().await?;
        let url = self.build_url(name, params);
        let body = self.http.get_json(&url).await?;
        parse_dataset(name, &body)
    }

    async fn health_check(&self) -> HashMap<String, bool> {
        let mut params = HashMap::new();
        params.insert("numOfRows".to_string(), "1".to_string());
        let ok = self.fetch_dataset("health", &params).await.is_ok();
        HashMap::from([(PROVIDER.to_string(), ok)])
    }
}

// Rows appear either as a top-level array or under response.body.items
fn parse_dataset(name: &str, body: &serde_json::Value) -> GatewayResult<Vec<DatasetRecord>> {
    let rows = body
        .as_array()
        .or_else(|| body["response"]["body"]["items"].as_array())
        .or_else(|| body.get("items").and_then(|v| v.as_array()))
        .ok_or_else(|| {
            GatewayError::Upstream(UpstreamError::MalformedResponse {
                provider: PROVIDER.to_string(),
                detail: format!("no row array in dataset '{}'", name),
            })
        })?;

    Ok(rows
        .iter()
        .filter_map(|row| row.as_object())
        .map(|obj| DatasetRecord {
            dataset: name.to_string(),
            fields: obj.clone().into_iter().collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_item_rows() {
        let body = json!({
            "response": { "body": { "items": [
                { "stockCode": "005930", "marketValue": 1_000_000 },
                { "stockCode": "000660", "marketValue": 500_000 }
            ]}}
        });

        let records = parse_dataset("nps_investment", &body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].dataset, "nps_investment");
        assert_eq!(records[0].fields["stockCode"], json!("005930"));
    }

    #[test]
    fn parses_top_level_array() {
        let body = json!([{ "a": 1 }, { "a": 2 }]);
        assert_eq!(parse_dataset("krx_market", &body).unwrap().len(), 2);
    }

    #[test]
    fn rejects_shapeless_payload() {
        let body = json!({ "unexpected": true });
        assert!(parse_dataset("fss_disclosure", &body).is_err());
    }
}
