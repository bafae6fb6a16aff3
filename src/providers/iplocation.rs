//! ipwho.is geolocation provider. Needs no API key.

use super::{read_json, Provider, SourceClient, SourceFailure, SourceResponse, SourceResult};
use crate::config::IpLocationConfig;
use crate::indicator::Indicator;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// ipwho.is lookup payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IpLocationData {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub connection: Option<IpLocationConnection>,
    pub timezone: Option<IpLocationTimezone>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IpLocationConnection {
    pub isp: Option<String>,
    pub org: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IpLocationTimezone {
    pub id: Option<String>,
}

/// ipwho.is client. IP only.
pub struct IpLocationClient {
    config: IpLocationConfig,
    client: Client,
}

impl IpLocationClient {
    /// Create a new geolocation client.
    pub fn new(config: IpLocationConfig) -> reqwest::Result<Self> {
        let client = super::http_client(Duration::from_millis(config.timeout_ms))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, indicator: &Indicator) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            indicator.value()
        )
    }

    async fn request(&self, indicator: &Indicator) -> SourceResult<IpLocationData> {
        debug!(ip = indicator.value(), "Querying ipwho.is");

        let response = self.client.get(self.endpoint(indicator)).send().await?;
        let data: IpLocationData = read_json(Provider::IpLocation, response).await?;

        // ipwho.is reports lookup errors in-band with a 200.
        if data.success == Some(false) {
            return Err(SourceFailure::Unavailable {
                status: None,
                detail: data
                    .message
                    .unwrap_or_else(|| "lookup unsuccessful".to_string()),
            });
        }

        debug!(
            ip = indicator.value(),
            country = ?data.country,
            "ipwho.is lookup complete"
        );

        Ok(data)
    }
}

#[async_trait]
impl SourceClient for IpLocationClient {
    fn provider(&self) -> Provider {
        Provider::IpLocation
    }

    async fn fetch(&self, indicator: &Indicator, _credential: Option<&str>) -> SourceResponse {
        SourceResponse::IpLocation(self.request(indicator).await)
    }
}
