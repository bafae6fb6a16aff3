//! vpnapi.io VPN/proxy detection provider.

use super::{read_json, Provider, SourceClient, SourceFailure, SourceResponse, SourceResult};
use crate::config::VpnApiConfig;
use crate::indicator::Indicator;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// vpnapi.io lookup payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VpnApiData {
    /// Address as echoed back by the provider.
    pub ip: Option<String>,
    pub security: Option<VpnApiSecurity>,
}

/// Anonymization flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VpnApiSecurity {
    pub vpn: Option<bool>,
    pub proxy: Option<bool>,
    pub tor: Option<bool>,
    pub hosting: Option<bool>,
    pub relay: Option<bool>,
}

/// vpnapi.io client. IP only.
pub struct VpnApiClient {
    config: VpnApiConfig,
    client: Client,
}

impl VpnApiClient {
    /// Create a new vpnapi.io client.
    pub fn new(config: VpnApiConfig) -> reqwest::Result<Self> {
        let client = super::http_client(Duration::from_millis(config.timeout_ms))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, indicator: &Indicator) -> String {
        format!(
            "{}/api/{}",
            self.config.base_url.trim_end_matches('/'),
            indicator.value()
        )
    }

    async fn request(&self, indicator: &Indicator, api_key: &str) -> SourceResult<VpnApiData> {
        debug!(ip = indicator.value(), "Querying vpnapi.io");

        // The key travels as a query parameter; keep it out of logged URLs.
        let response = self
            .client
            .get(self.endpoint(indicator))
            .query(&[("key", api_key)])
            .send()
            .await
            .map_err(|e| SourceFailure::from(e.without_url()))?;

        let data: VpnApiData = read_json(Provider::VpnApi, response).await?;

        debug!(
            ip = indicator.value(),
            security = ?data.security,
            "vpnapi.io lookup complete"
        );

        Ok(data)
    }
}

#[async_trait]
impl SourceClient for VpnApiClient {
    fn provider(&self) -> Provider {
        Provider::VpnApi
    }

    async fn fetch(&self, indicator: &Indicator, credential: Option<&str>) -> SourceResponse {
        let result = match credential {
            Some(key) => self.request(indicator, key).await,
            None => Err(SourceFailure::Unauthorized { status: 401 }),
        };
        SourceResponse::VpnApi(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::{validate, IndicatorKind};

    fn create_test_config() -> VpnApiConfig {
        VpnApiConfig {
            base_url: "https://vpnapi.io".to_string(),
            timeout_ms: 5000,
        }
    }

    #[test]
    fn test_endpoint_has_no_key() {
        let client = VpnApiClient::new(create_test_config()).unwrap();
        let ip = validate(IndicatorKind::Ip, "8.8.8.8").unwrap();
        assert_eq!(client.endpoint(&ip), "https://vpnapi.io/api/8.8.8.8");
    }

    #[test]
    fn test_parse_response() {
        let json = r#"{
            "ip": "8.8.8.8",
            "security": {"vpn": false, "proxy": false, "tor": false, "relay": false, "hosting": true},
            "location": {"city": "", "country": "United States"}
        }"#;

        let data: VpnApiData = serde_json::from_str(json).unwrap();
        let security = data.security.unwrap();
        assert_eq!(data.ip.as_deref(), Some("8.8.8.8"));
        assert_eq!(security.vpn, Some(false));
        assert_eq!(security.hosting, Some(true));
    }

    #[test]
    fn test_parse_error_message_body() {
        // vpnapi answers bad keys with a bare message object
        let data: VpnApiData =
            serde_json::from_str(r#"{"message": "Invalid API key"}"#).unwrap();
        assert!(data.security.is_none());
        assert!(data.ip.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_captured() {
        let client = VpnApiClient::new(VpnApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_ms: 2000,
        })
        .unwrap();
        let ip = validate(IndicatorKind::Ip, "8.8.8.8").unwrap();

        match client.fetch(&ip, Some("secret")).await {
            SourceResponse::VpnApi(Err(failure)) => {
                assert!(!failure.to_string().contains("secret"));
            }
            other => panic!("expected vpnapi failure, got {:?}", other),
        }
    }
}
