//! Reputation source clients.
//!
//! Every upstream service sits behind [`SourceClient`]. A client never
//! returns an error past its own boundary: transport errors, non-2xx
//! statuses and undecodable bodies all come back as the failure half of
//! a [`SourceResponse`] variant.

pub mod abuseipdb;
pub mod iplocation;
pub mod virustotal;
pub mod vpnapi;

use crate::indicator::{Indicator, IndicatorKind};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub use abuseipdb::{AbuseIpdbClient, AbuseIpdbData};
pub use iplocation::{IpLocationClient, IpLocationData};
pub use virustotal::{VirusTotalAttributes, VirusTotalClient};
pub use vpnapi::{VpnApiClient, VpnApiData};

/// Upstream reputation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    VpnApi,
    VirusTotal,
    AbuseIpdb,
    IpLocation,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::VpnApi,
        Provider::VirusTotal,
        Provider::AbuseIpdb,
        Provider::IpLocation,
    ];

    /// Name used as the key in reports and credential maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::VpnApi => "vpnapi",
            Provider::VirusTotal => "virustotal",
            Provider::AbuseIpdb => "abuseipdb",
            Provider::IpLocation => "iplocation",
        }
    }

    /// Whether this provider can say anything about the given indicator kind.
    pub fn supports(&self, kind: IndicatorKind) -> bool {
        match self {
            Provider::VirusTotal => true,
            Provider::VpnApi | Provider::AbuseIpdb | Provider::IpLocation => {
                kind == IndicatorKind::Ip
            }
        }
    }

    /// Whether calls to this provider need an API key.
    pub fn requires_credential(&self) -> bool {
        !matches!(self, Provider::IpLocation)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request API keys, keyed by provider.
///
/// Keys are opaque and never logged; `Debug` only lists which providers
/// have one.
#[derive(Clone, Default)]
pub struct SourceCredentials {
    keys: BTreeMap<Provider, String>,
}

impl SourceCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key. Empty keys are ignored.
    pub fn with(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.insert(provider, key);
        self
    }

    /// Set a key, replacing any previous one. Empty keys are ignored.
    pub fn insert(&mut self, provider: Provider, key: impl Into<String>) {
        let key = key.into();
        if !key.trim().is_empty() {
            self.keys.insert(provider, key);
        }
    }

    pub fn get(&self, provider: Provider) -> Option<&str> {
        self.keys.get(&provider).map(String::as_str)
    }

    pub fn contains(&self, provider: Provider) -> bool {
        self.keys.contains_key(&provider)
    }
}

impl fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys.keys()).finish()
    }
}

/// Coarse classification of a source failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unauthorized,
    Unavailable,
    Malformed,
    Internal,
}

/// Why a single source produced no data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceFailure {
    /// Key rejected (401/403).
    #[error("unauthorized (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Provider unreachable or answered with a non-success status.
    #[error("upstream unavailable: {detail}")]
    Unavailable { status: Option<u16>, detail: String },

    /// Call exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// Body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Fault inside this process. Detail goes to the log only.
    #[error("internal error")]
    Internal,
}

impl SourceFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            SourceFailure::Unauthorized { .. } => FailureKind::Unauthorized,
            SourceFailure::Unavailable { .. } | SourceFailure::Timeout => {
                FailureKind::Unavailable
            }
            SourceFailure::Malformed(_) => FailureKind::Malformed,
            SourceFailure::Internal => FailureKind::Internal,
        }
    }

    /// HTTP status returned by the provider, if it got that far.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            SourceFailure::Unauthorized { status } => Some(*status),
            SourceFailure::Unavailable { status, .. } => *status,
            SourceFailure::Timeout | SourceFailure::Malformed(_) | SourceFailure::Internal => None,
        }
    }

    fn from_status(provider: Provider, status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 | 403 => SourceFailure::Unauthorized {
                status: status.as_u16(),
            },
            429 => {
                warn!(provider = %provider, "Rate limit exceeded");
                SourceFailure::Unavailable {
                    status: Some(429),
                    detail: "rate limited".to_string(),
                }
            }
            code => SourceFailure::Unavailable {
                status: Some(code),
                detail: format!("HTTP {}: {}", code, truncate(body, 200)),
            },
        }
    }
}

impl From<reqwest::Error> for SourceFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceFailure::Timeout
        } else if e.is_decode() {
            SourceFailure::Malformed(e.to_string())
        } else {
            SourceFailure::Unavailable {
                status: e.status().map(|s| s.as_u16()),
                detail: e.to_string(),
            }
        }
    }
}

/// Outcome of one call to one provider.
pub type SourceResult<T> = Result<T, SourceFailure>;

/// Raw answer from a provider, one shape per provider.
#[derive(Debug, Clone)]
pub enum SourceResponse {
    VpnApi(SourceResult<VpnApiData>),
    VirusTotal(SourceResult<VirusTotalAttributes>),
    AbuseIpdb(SourceResult<AbuseIpdbData>),
    IpLocation(SourceResult<IpLocationData>),
}

impl SourceResponse {
    pub fn provider(&self) -> Provider {
        match self {
            SourceResponse::VpnApi(_) => Provider::VpnApi,
            SourceResponse::VirusTotal(_) => Provider::VirusTotal,
            SourceResponse::AbuseIpdb(_) => Provider::AbuseIpdb,
            SourceResponse::IpLocation(_) => Provider::IpLocation,
        }
    }

    /// Build the failure variant for a provider.
    pub fn failed(provider: Provider, failure: SourceFailure) -> Self {
        match provider {
            Provider::VpnApi => SourceResponse::VpnApi(Err(failure)),
            Provider::VirusTotal => SourceResponse::VirusTotal(Err(failure)),
            Provider::AbuseIpdb => SourceResponse::AbuseIpdb(Err(failure)),
            Provider::IpLocation => SourceResponse::IpLocation(Err(failure)),
        }
    }

    pub fn failure(&self) -> Option<&SourceFailure> {
        match self {
            SourceResponse::VpnApi(r) => r.as_ref().err(),
            SourceResponse::VirusTotal(r) => r.as_ref().err(),
            SourceResponse::AbuseIpdb(r) => r.as_ref().err(),
            SourceResponse::IpLocation(r) => r.as_ref().err(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }
}

/// A reputation source.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Which provider this client talks to.
    fn provider(&self) -> Provider;

    /// Fetch reputation data for an indicator.
    ///
    /// `credential` is `None` only for providers that do not require one.
    async fn fetch(&self, indicator: &Indicator, credential: Option<&str>) -> SourceResponse;
}

/// Check the status and decode a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: Provider,
    response: reqwest::Response,
) -> SourceResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SourceFailure::from(e.without_url()))?;

    if !status.is_success() {
        return Err(SourceFailure::from_status(provider, status, &body));
    }

    serde_json::from_str(&body).map_err(|e| SourceFailure::Malformed(e.to_string()))
}

/// Build the HTTP client shared by one provider's calls.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("zentinel-indicator-reputation/", env!("CARGO_PKG_VERSION")))
        .build()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names() {
        assert_eq!(Provider::VpnApi.as_str(), "vpnapi");
        assert_eq!(Provider::VirusTotal.as_str(), "virustotal");
        assert_eq!(Provider::AbuseIpdb.as_str(), "abuseipdb");
        assert_eq!(Provider::IpLocation.as_str(), "iplocation");
        assert_eq!(
            serde_json::to_string(&Provider::AbuseIpdb).unwrap(),
            "\"abuseipdb\""
        );
    }

    #[test]
    fn test_provider_applicability() {
        let for_kind = |kind| -> Vec<Provider> {
            Provider::ALL.into_iter().filter(|p| p.supports(kind)).collect()
        };
        assert_eq!(for_kind(IndicatorKind::Ip).len(), 4);
        assert_eq!(for_kind(IndicatorKind::Hash), vec![Provider::VirusTotal]);
        assert_eq!(for_kind(IndicatorKind::Domain), vec![Provider::VirusTotal]);
    }

    #[test]
    fn test_only_geolocation_is_keyless() {
        assert!(Provider::VpnApi.requires_credential());
        assert!(Provider::VirusTotal.requires_credential());
        assert!(Provider::AbuseIpdb.requires_credential());
        assert!(!Provider::IpLocation.requires_credential());
    }

    #[test]
    fn test_credentials_ignore_empty_keys() {
        let creds = SourceCredentials::new()
            .with(Provider::VirusTotal, "vt-key")
            .with(Provider::AbuseIpdb, "")
            .with(Provider::VpnApi, "   ");

        assert_eq!(creds.get(Provider::VirusTotal), Some("vt-key"));
        assert!(!creds.contains(Provider::AbuseIpdb));
        assert!(!creds.contains(Provider::VpnApi));
    }

    #[test]
    fn test_credentials_debug_hides_keys() {
        let creds = SourceCredentials::new().with(Provider::VirusTotal, "super-secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("VirusTotal"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_failure_classification() {
        let unauthorized =
            SourceFailure::from_status(Provider::VirusTotal, reqwest::StatusCode::FORBIDDEN, "");
        assert_eq!(unauthorized.kind(), FailureKind::Unauthorized);
        assert_eq!(unauthorized.upstream_status(), Some(403));

        let limited = SourceFailure::from_status(
            Provider::AbuseIpdb,
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "",
        );
        assert_eq!(limited.kind(), FailureKind::Unavailable);
        assert_eq!(limited.upstream_status(), Some(429));

        let missing =
            SourceFailure::from_status(Provider::VirusTotal, reqwest::StatusCode::NOT_FOUND, "{}");
        assert_eq!(missing.upstream_status(), Some(404));

        assert_eq!(SourceFailure::Timeout.kind(), FailureKind::Unavailable);
        assert_eq!(
            SourceFailure::Malformed("eof".into()).kind(),
            FailureKind::Malformed
        );
        assert_eq!(SourceFailure::Internal.kind(), FailureKind::Internal);
        assert_eq!(SourceFailure::Internal.upstream_status(), None);
    }

    #[test]
    fn test_failed_response_variant() {
        for provider in Provider::ALL {
            let response = SourceResponse::failed(provider, SourceFailure::Malformed("x".into()));
            assert_eq!(response.provider(), provider);
            assert!(!response.is_success());
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
