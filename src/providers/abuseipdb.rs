//! AbuseIPDB abuse-report provider.

use super::{read_json, Provider, SourceClient, SourceFailure, SourceResponse, SourceResult};
use crate::config::AbuseIpdbConfig;
use crate::indicator::Indicator;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// AbuseIPDB API response.
#[derive(Debug, Deserialize)]
struct AbuseIpdbResponse {
    data: AbuseIpdbData,
}

/// AbuseIPDB `check` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AbuseIpdbData {
    /// Abuse confidence score (0-100).
    pub abuse_confidence_score: Option<u8>,

    /// Total number of reports.
    pub total_reports: Option<u32>,

    /// Country code.
    pub country_code: Option<String>,

    /// ISP name.
    pub isp: Option<String>,

    /// Domain associated with the ISP.
    pub domain: Option<String>,

    /// Whether the IP is a known Tor exit node.
    pub is_tor: Option<bool>,

    /// Whether the IP is a known public proxy.
    pub is_public_proxy: Option<bool>,

    /// Usage type (e.g., "Data Center/Web Hosting/Transit").
    pub usage_type: Option<String>,
}

/// AbuseIPDB client. IP only.
pub struct AbuseIpdbClient {
    config: AbuseIpdbConfig,
    client: Client,
}

impl AbuseIpdbClient {
    /// Create a new AbuseIPDB client.
    pub fn new(config: AbuseIpdbConfig) -> reqwest::Result<Self> {
        let client = super::http_client(Duration::from_millis(config.timeout_ms))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, indicator: &Indicator) -> String {
        format!(
            "{}/api/v2/check?ipAddress={}&maxAgeInDays={}",
            self.config.base_url.trim_end_matches('/'),
            indicator.value(),
            self.config.max_age_days
        )
    }

    async fn request(&self, indicator: &Indicator, api_key: &str) -> SourceResult<AbuseIpdbData> {
        let url = self.endpoint(indicator);
        debug!(ip = indicator.value(), "Querying AbuseIPDB");

        let response = self
            .client
            .get(&url)
            .header("Key", api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let body: AbuseIpdbResponse = read_json(Provider::AbuseIpdb, response).await?;
        let data = body.data;

        debug!(
            ip = indicator.value(),
            score = ?data.abuse_confidence_score,
            reports = ?data.total_reports,
            is_tor = ?data.is_tor,
            "AbuseIPDB lookup complete"
        );

        Ok(data)
    }
}

#[async_trait]
impl SourceClient for AbuseIpdbClient {
    fn provider(&self) -> Provider {
        Provider::AbuseIpdb
    }

    async fn fetch(&self, indicator: &Indicator, credential: Option<&str>) -> SourceResponse {
        let result = match credential {
            Some(key) => self.request(indicator, key).await,
            None => Err(SourceFailure::Unauthorized { status: 401 }),
        };
        SourceResponse::AbuseIpdb(result)
    }
}
