//! Provider response normalization.
//!
//! This is the only module that knows every provider's raw shape. It maps
//! each [`SourceResponse`] onto a fixed field set for the report and onto
//! the numeric [`NormalizedSignal`] the scoring engine consumes.
//!
//! Defaulting policy: a missing number becomes `0`, a missing or empty
//! string becomes `"N/A"`, a missing flag becomes `false`.

use crate::indicator::{Indicator, IndicatorKind};
use crate::providers::{
    AbuseIpdbData, IpLocationData, Provider, SourceResponse, VirusTotalAttributes, VpnApiData,
};
use chrono::{DateTime, SecondsFormat};
use serde::Serialize;
use std::collections::BTreeMap;

/// Placeholder for absent strings.
pub const NOT_AVAILABLE: &str = "N/A";

/// Normalized vpnapi.io fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VpnApiFields {
    pub vpn: bool,
    pub proxy: bool,
    pub tor: bool,
    pub hosting: bool,
    pub query: String,
    pub permalink: String,
}

/// Normalized VirusTotal fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirusTotalFields {
    pub malicious: u32,
    pub suspicious: u32,
    pub harmless: u32,
    pub reputation: i64,
    /// Engines flagging the indicator (malicious + suspicious).
    pub positives: u32,
    /// Engines with an opinion (malicious + suspicious + harmless).
    pub total: u32,
    pub scan_date: String,
    pub permalink: String,
}

/// Normalized AbuseIPDB fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbuseIpdbFields {
    pub abuse_confidence_percentage: u8,
    pub total_reports: u32,
    pub country_code: String,
    pub isp: String,
    pub domain: String,
    pub permalink: String,
}

/// Normalized ipwho.is fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IpLocationFields {
    pub country: String,
    pub region: String,
    pub city: String,
    pub lat: f64,
    pub lon: f64,
    pub isp: String,
    pub org: String,
    pub timezone: String,
    pub permalink: String,
}

/// Canonical fields for one provider, serialized flat into the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SourceFields {
    VpnApi(VpnApiFields),
    VirusTotal(VirusTotalFields),
    AbuseIpdb(AbuseIpdbFields),
    IpLocation(IpLocationFields),
}

impl SourceFields {
    pub fn provider(&self) -> Provider {
        match self {
            SourceFields::VpnApi(_) => Provider::VpnApi,
            SourceFields::VirusTotal(_) => Provider::VirusTotal,
            SourceFields::AbuseIpdb(_) => Provider::AbuseIpdb,
            SourceFields::IpLocation(_) => Provider::IpLocation,
        }
    }

    /// The all-defaults entry used when a provider returned nothing.
    pub fn defaults(provider: Provider, indicator: &Indicator) -> Self {
        match provider {
            Provider::VpnApi => {
                SourceFields::VpnApi(vpnapi_fields(indicator, &VpnApiData::default()))
            }
            Provider::VirusTotal => SourceFields::VirusTotal(virustotal_fields(
                indicator,
                &VirusTotalAttributes::default(),
            )),
            Provider::AbuseIpdb => {
                SourceFields::AbuseIpdb(abuseipdb_fields(indicator, &AbuseIpdbData::default()))
            }
            Provider::IpLocation => {
                SourceFields::IpLocation(iplocation_fields(indicator, &IpLocationData::default()))
            }
        }
    }
}

/// Normalize one provider response. `None` when the call failed.
pub fn normalize(indicator: &Indicator, response: &SourceResponse) -> Option<SourceFields> {
    let fields = match response {
        SourceResponse::VpnApi(Ok(data)) => SourceFields::VpnApi(vpnapi_fields(indicator, data)),
        SourceResponse::VirusTotal(Ok(attrs)) => {
            SourceFields::VirusTotal(virustotal_fields(indicator, attrs))
        }
        SourceResponse::AbuseIpdb(Ok(data)) => {
            SourceFields::AbuseIpdb(abuseipdb_fields(indicator, data))
        }
        SourceResponse::IpLocation(Ok(data)) => {
            SourceFields::IpLocation(iplocation_fields(indicator, data))
        }
        _ => return None,
    };
    Some(fields)
}

fn vpnapi_fields(indicator: &Indicator, data: &VpnApiData) -> VpnApiFields {
    let security = data.security.clone().unwrap_or_default();
    VpnApiFields {
        vpn: security.vpn.unwrap_or(false),
        proxy: security.proxy.unwrap_or(false),
        tor: security.tor.unwrap_or(false),
        hosting: security.hosting.unwrap_or(false),
        query: data
            .ip
            .clone()
            .unwrap_or_else(|| indicator.value().to_string()),
        permalink: permalink(Provider::VpnApi, indicator),
    }
}

fn virustotal_fields(indicator: &Indicator, attrs: &VirusTotalAttributes) -> VirusTotalFields {
    let stats = attrs.last_analysis_stats.clone().unwrap_or_default();
    let malicious = stats.malicious.unwrap_or(0);
    let suspicious = stats.suspicious.unwrap_or(0);
    let harmless = stats.harmless.unwrap_or(0);

    VirusTotalFields {
        malicious,
        suspicious,
        harmless,
        reputation: attrs.reputation.unwrap_or(0),
        positives: malicious.saturating_add(suspicious),
        total: malicious.saturating_add(suspicious).saturating_add(harmless),
        scan_date: iso_timestamp(attrs.last_analysis_date),
        permalink: permalink(Provider::VirusTotal, indicator),
    }
}

fn abuseipdb_fields(indicator: &Indicator, data: &AbuseIpdbData) -> AbuseIpdbFields {
    AbuseIpdbFields {
        abuse_confidence_percentage: data.abuse_confidence_score.unwrap_or(0).min(100),
        total_reports: data.total_reports.unwrap_or(0),
        country_code: text(data.country_code.as_deref()),
        isp: text(data.isp.as_deref()),
        domain: text(data.domain.as_deref()),
        permalink: permalink(Provider::AbuseIpdb, indicator),
    }
}

fn iplocation_fields(indicator: &Indicator, data: &IpLocationData) -> IpLocationFields {
    let connection = data.connection.clone().unwrap_or_default();
    IpLocationFields {
        country: text(data.country.as_deref()),
        region: text(data.region.as_deref()),
        city: text(data.city.as_deref()),
        lat: data.latitude.unwrap_or(0.0),
        lon: data.longitude.unwrap_or(0.0),
        isp: text(connection.isp.as_deref()),
        org: text(connection.org.as_deref()),
        timezone: text(data.timezone.as_ref().and_then(|tz| tz.id.as_deref())),
        permalink: permalink(Provider::IpLocation, indicator),
    }
}

/// Provider page for an indicator. Pure formatting, no lookup.
pub fn permalink(provider: Provider, indicator: &Indicator) -> String {
    let value = indicator.value();
    match provider {
        Provider::VirusTotal => {
            let section = match indicator.kind() {
                IndicatorKind::Ip => "ip-address",
                IndicatorKind::Hash => "file",
                IndicatorKind::Domain => "domain",
            };
            format!("https://www.virustotal.com/gui/{}/{}/detection", section, value)
        }
        Provider::AbuseIpdb => format!("https://www.abuseipdb.com/check/{}", value),
        Provider::VpnApi => format!("https://vpnapi.io/api/{}", value),
        Provider::IpLocation => format!("https://ipwho.is/{}", value),
    }
}

/// Provider-agnostic inputs to the scoring engine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NormalizedSignal {
    /// Share of engines voting malicious or suspicious, 0-100, unrounded.
    pub malicious_vote_percent: f64,
    /// Abuse confidence, 0-100.
    pub abuse_confidence_percent: f64,
    /// Share of anonymization flags set, 0-100 in steps of 25.
    pub vpn_flag_ratio: f64,
    /// Rounded share of engines flagging the indicator, 0-100.
    pub detection_ratio: u8,
}

impl NormalizedSignal {
    /// Collect signals from every normalized source. Sources that contribute
    /// nothing leave their signals at zero.
    pub fn from_sources<'a>(sources: impl IntoIterator<Item = &'a SourceFields>) -> Self {
        let mut signal = Self::default();
        for fields in sources {
            signal.absorb(fields);
        }
        signal
    }

    fn absorb(&mut self, fields: &SourceFields) {
        match fields {
            SourceFields::VirusTotal(vt) => {
                self.malicious_vote_percent =
                    malicious_vote_percent(vt.malicious, vt.suspicious, vt.harmless);
                self.detection_ratio = detection_ratio(vt.malicious, vt.suspicious, vt.harmless);
            }
            SourceFields::AbuseIpdb(abuse) => {
                self.abuse_confidence_percent = f64::from(abuse.abuse_confidence_percentage);
            }
            SourceFields::VpnApi(vpn) => {
                self.vpn_flag_ratio = vpn_flag_ratio([vpn.vpn, vpn.proxy, vpn.tor, vpn.hosting]);
            }
            SourceFields::IpLocation(_) => {}
        }
    }
}

/// `100 * (malicious + suspicious) / total`, unrounded; 0 with no votes.
pub fn malicious_vote_percent(malicious: u32, suspicious: u32, harmless: u32) -> f64 {
    let flagged = f64::from(malicious) + f64::from(suspicious);
    let total = flagged + f64::from(harmless);
    100.0 * flagged / total.max(1.0)
}

/// Rounded integer percentage of flagging engines; 0 with no engines.
pub fn detection_ratio(malicious: u32, suspicious: u32, harmless: u32) -> u8 {
    malicious_vote_percent(malicious, suspicious, harmless)
        .round()
        .clamp(0.0, 100.0) as u8
}

/// Percentage of the four anonymization flags that are set.
pub fn vpn_flag_ratio(flags: [bool; 4]) -> f64 {
    let set = flags.iter().filter(|flag| **flag).count();
    set as f64 / 4.0 * 100.0
}

/// Registration and DNS facts for domain indicators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainInfo {
    pub registrar: String,
    pub creation_date: String,
    pub last_dns_records: Vec<serde_json::Value>,
    pub categories: BTreeMap<String, String>,
}

impl DomainInfo {
    pub fn from_attributes(attrs: &VirusTotalAttributes) -> Self {
        Self {
            registrar: text(attrs.registrar.as_deref()),
            creation_date: iso_timestamp(attrs.creation_date),
            last_dns_records: attrs.last_dns_records.clone().unwrap_or_default(),
            categories: attrs.categories.clone().unwrap_or_default(),
        }
    }
}

/// Identity and sighting facts for file-hash indicators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub size: u64,
    pub first_seen: String,
    pub last_seen: String,
}

impl FileInfo {
    pub fn from_attributes(attrs: &VirusTotalAttributes) -> Self {
        Self {
            name: text(attrs.meaningful_name.as_deref()),
            md5: text(attrs.md5.as_deref()),
            sha1: text(attrs.sha1.as_deref()),
            sha256: text(attrs.sha256.as_deref()),
            file_type: text(attrs.type_description.as_deref()),
            size: attrs.size.unwrap_or(0),
            first_seen: iso_timestamp(attrs.first_submission_date),
            last_seen: iso_timestamp(attrs.last_modification_date),
        }
    }
}

fn text(value: Option<&str>) -> String {
    match value {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Unix seconds as an ISO-8601 UTC string with milliseconds.
fn iso_timestamp(secs: Option<i64>) -> String {
    secs.filter(|s| *s > 0)
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
