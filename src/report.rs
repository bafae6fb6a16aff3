//! Aggregated report returned for one analysis.

use crate::indicator::{Indicator, IndicatorKind};
use crate::normalize::{DomainInfo, FileInfo, SourceFields};
use crate::providers::{Provider, SourceFailure};
use crate::scoring::{Assessment, Verdict};
use serde::Serialize;
use std::collections::BTreeMap;

/// Headline score, verdict and advice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub score: u8,

    /// Same value as `score`; present for hash and domain indicators.
    #[serde(rename = "detectionRatio", skip_serializing_if = "Option::is_none")]
    pub detection_ratio: Option<u8>,

    pub verdict: Verdict,
    pub recommendation: &'static str,
}

impl Summary {
    pub fn new(kind: IndicatorKind, assessment: &Assessment) -> Self {
        let detection_ratio = match kind {
            IndicatorKind::Ip => None,
            IndicatorKind::Hash | IndicatorKind::Domain => Some(assessment.score),
        };
        Self {
            score: assessment.score,
            detection_ratio,
            verdict: assessment.verdict,
            recommendation: assessment.recommendation,
        }
    }
}

/// Whether a source contributed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Ok,
    Degraded,
}

/// One provider's normalized fields plus call outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceEntry {
    #[serde(flatten)]
    pub fields: SourceFields,

    pub status: SourceStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceEntry {
    pub fn ok(fields: SourceFields) -> Self {
        Self {
            fields,
            status: SourceStatus::Ok,
            error: None,
        }
    }

    /// Defaults-only entry for a provider that failed.
    pub fn degraded(provider: Provider, indicator: &Indicator, failure: &SourceFailure) -> Self {
        Self {
            fields: SourceFields::defaults(provider, indicator),
            status: SourceStatus::Degraded,
            error: Some(failure.to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == SourceStatus::Degraded
    }
}

/// Final report for one indicator. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedReport {
    summary: Summary,
    sources: BTreeMap<Provider, SourceEntry>,

    #[serde(skip_serializing_if = "Option::is_none")]
    domain_info: Option<DomainInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    file_info: Option<FileInfo>,
}

impl AggregatedReport {
    pub(crate) fn new(
        summary: Summary,
        sources: BTreeMap<Provider, SourceEntry>,
        domain_info: Option<DomainInfo>,
        file_info: Option<FileInfo>,
    ) -> Self {
        Self {
            summary,
            sources,
            domain_info,
            file_info,
        }
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn sources(&self) -> &BTreeMap<Provider, SourceEntry> {
        &self.sources
    }

    pub fn source(&self, provider: Provider) -> Option<&SourceEntry> {
        self.sources.get(&provider)
    }

    pub fn domain_info(&self) -> Option<&DomainInfo> {
        self.domain_info.as_ref()
    }

    pub fn file_info(&self) -> Option<&FileInfo> {
        self.file_info.as_ref()
    }

    /// Providers whose call failed.
    pub fn degraded_sources(&self) -> impl Iterator<Item = Provider> + '_ {
        self.sources
            .iter()
            .filter(|(_, entry)| entry.is_degraded())
            .map(|(provider, _)| *provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::validate;
    use crate::normalize::NormalizedSignal;
    use crate::scoring::assess;

    fn ip() -> Indicator {
        validate(IndicatorKind::Ip, "8.8.8.8").unwrap()
    }

    #[test]
    fn test_summary_detection_ratio_only_for_hash_and_domain() {
        let assessment = assess(IndicatorKind::Ip, &NormalizedSignal::default()).unwrap();
        let ip_summary =
            serde_json::to_value(Summary::new(IndicatorKind::Ip, &assessment)).unwrap();
        assert!(ip_summary.get("detectionRatio").is_none());
        assert_eq!(ip_summary["verdict"], "Safe");

        let assessment = assess(IndicatorKind::Hash, &NormalizedSignal::default()).unwrap();
        let hash_summary =
            serde_json::to_value(Summary::new(IndicatorKind::Hash, &assessment)).unwrap();
        assert_eq!(hash_summary["detectionRatio"], 0);
        assert_eq!(hash_summary["score"], 0);
        assert_eq!(hash_summary["verdict"], "Clean");
    }

    #[test]
    fn test_source_entry_serializes_flat() {
        let entry = SourceEntry::ok(SourceFields::defaults(Provider::VirusTotal, &ip()));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["malicious"], 0);
        assert_eq!(
            value["permalink"],
            "https://www.virustotal.com/gui/ip-address/8.8.8.8/detection"
        );
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_degraded_entry() {
        let entry = SourceEntry::degraded(Provider::AbuseIpdb, &ip(), &SourceFailure::Timeout);
        assert!(entry.is_degraded());

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["status"], "degraded");
        assert_eq!(value["error"], "request timed out");
        assert_eq!(value["abuseConfidencePercentage"], 0);
        assert_eq!(value["isp"], "N/A");
    }

    #[test]
    fn test_report_shape() {
        let assessment = assess(IndicatorKind::Ip, &NormalizedSignal::default()).unwrap();
        let mut sources = BTreeMap::new();
        sources.insert(
            Provider::IpLocation,
            SourceEntry::ok(SourceFields::defaults(Provider::IpLocation, &ip())),
        );
        sources.insert(
            Provider::VpnApi,
            SourceEntry::degraded(Provider::VpnApi, &ip(), &SourceFailure::Timeout),
        );

        let report = AggregatedReport::new(
            Summary::new(IndicatorKind::Ip, &assessment),
            sources,
            None,
            None,
        );

        assert_eq!(report.degraded_sources().collect::<Vec<_>>(), vec![Provider::VpnApi]);

        let value = serde_json::to_value(&report).unwrap();
        assert!(value["sources"]["iplocation"].is_object());
        assert!(value["sources"]["vpnapi"].is_object());
        assert!(value.get("domain_info").is_none());
        assert!(value.get("file_info").is_none());
    }
}
