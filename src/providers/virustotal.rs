//! VirusTotal malware-reputation provider.

use super::{read_json, Provider, SourceClient, SourceFailure, SourceResponse, SourceResult};
use crate::config::VirusTotalConfig;
use crate::indicator::{Indicator, IndicatorKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// VirusTotal v3 object envelope.
#[derive(Debug, Deserialize)]
struct VirusTotalResponse {
    data: VirusTotalObject,
}

#[derive(Debug, Deserialize)]
struct VirusTotalObject {
    #[serde(default)]
    attributes: VirusTotalAttributes,
}

/// Engine verdict counts from the most recent analysis.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AnalysisStats {
    pub malicious: Option<u32>,
    pub suspicious: Option<u32>,
    pub harmless: Option<u32>,
    pub undetected: Option<u32>,
}

/// Attributes of an IP address, domain or file object.
///
/// Only the fields the normalizer reads are modelled; most are specific to
/// one object type and absent on the others.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VirusTotalAttributes {
    pub last_analysis_stats: Option<AnalysisStats>,
    pub last_analysis_date: Option<i64>,
    pub reputation: Option<i64>,

    // Domains
    pub registrar: Option<String>,
    pub creation_date: Option<i64>,
    pub last_dns_records: Option<Vec<serde_json::Value>>,
    pub categories: Option<BTreeMap<String, String>>,

    // Files
    pub meaningful_name: Option<String>,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub type_description: Option<String>,
    pub size: Option<u64>,
    pub first_submission_date: Option<i64>,
    pub last_modification_date: Option<i64>,
}

/// VirusTotal client. Covers IPs, file hashes and domains.
pub struct VirusTotalClient {
    config: VirusTotalConfig,
    client: Client,
}

impl VirusTotalClient {
    /// Create a new VirusTotal client.
    pub fn new(config: VirusTotalConfig) -> reqwest::Result<Self> {
        let client = super::http_client(Duration::from_millis(config.timeout_ms))?;
        Ok(Self { config, client })
    }

    /// Object URL for an indicator.
    fn endpoint(&self, indicator: &Indicator) -> String {
        let collection = match indicator.kind() {
            IndicatorKind::Ip => "ip_addresses",
            IndicatorKind::Hash => "files",
            IndicatorKind::Domain => "domains",
        };
        format!(
            "{}/api/v3/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            collection,
            indicator.value()
        )
    }

    async fn request(
        &self,
        indicator: &Indicator,
        api_key: &str,
    ) -> SourceResult<VirusTotalAttributes> {
        let url = self.endpoint(indicator);
        debug!(indicator = %indicator, "Querying VirusTotal");

        let response = self
            .client
            .get(&url)
            .header("x-apikey", api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let body: VirusTotalResponse = read_json(Provider::VirusTotal, response).await?;
        let attributes = body.data.attributes;

        debug!(
            indicator = %indicator,
            stats = ?attributes.last_analysis_stats,
            reputation = ?attributes.reputation,
            "VirusTotal lookup complete"
        );

        Ok(attributes)
    }
}

#[async_trait]
impl SourceClient for VirusTotalClient {
    fn provider(&self) -> Provider {
        Provider::VirusTotal
    }

    async fn fetch(&self, indicator: &Indicator, credential: Option<&str>) -> SourceResponse {
        let result = match credential {
            Some(key) => self.request(indicator, key).await,
            None => Err(SourceFailure::Unauthorized { status: 401 }),
        };
        SourceResponse::VirusTotal(result)
    }
}
