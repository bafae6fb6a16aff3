//! Reputation analyzer: validates an indicator, fans out to every applicable
//! source, and assembles the scored report.

use crate::config::Config;
use crate::error::AnalyzeError;
use crate::indicator::{Indicator, IndicatorKind};
use crate::normalize::{normalize, DomainInfo, FileInfo, NormalizedSignal};
use crate::providers::{
    AbuseIpdbClient, IpLocationClient, Provider, SourceClient, SourceCredentials, SourceFailure,
    SourceResponse, VirusTotalClient, VpnApiClient,
};
use crate::report::{AggregatedReport, SourceEntry, Summary};
use crate::scoring;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Indicator reputation analyzer.
///
/// Holds only immutable clients; every call to [`analyze`](Self::analyze) is
/// independent and takes its credentials as a parameter.
pub struct ReputationAnalyzer {
    clients: Vec<Arc<dyn SourceClient>>,
    deadline: Duration,
}

impl ReputationAnalyzer {
    /// Create an analyzer with one client per provider.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let clients: Vec<Arc<dyn SourceClient>> = vec![
            Arc::new(VpnApiClient::new(config.vpnapi.clone())?),
            Arc::new(VirusTotalClient::new(config.virustotal.clone())?),
            Arc::new(AbuseIpdbClient::new(config.abuseipdb.clone())?),
            Arc::new(IpLocationClient::new(config.iplocation.clone())?),
        ];

        info!(
            providers = clients.len(),
            deadline_ms = config.settings.deadline_ms,
            "Reputation analyzer initialized"
        );

        Ok(Self::with_clients(clients, config.deadline()))
    }

    /// Create an analyzer over an explicit client set.
    pub fn with_clients(clients: Vec<Arc<dyn SourceClient>>, deadline: Duration) -> Self {
        Self { clients, deadline }
    }

    /// Analyze an indicator using the configured per-call deadline.
    pub async fn analyze(
        &self,
        kind: IndicatorKind,
        raw: &str,
        credentials: &SourceCredentials,
    ) -> Result<AggregatedReport, AnalyzeError> {
        self.analyze_within(kind, raw, credentials, self.deadline).await
    }

    /// Analyze an indicator with an explicit per-call deadline.
    pub async fn analyze_within(
        &self,
        kind: IndicatorKind,
        raw: &str,
        credentials: &SourceCredentials,
        deadline: Duration,
    ) -> Result<AggregatedReport, AnalyzeError> {
        let indicator = Indicator::parse(kind, raw)?;

        let clients = self.applicable_clients(kind);
        let missing = missing_credentials(&clients, credentials);
        if !missing.is_empty() {
            warn!(kind = %kind, missing = ?missing, "Missing API keys, no sources queried");
            return Err(AnalyzeError::MissingCredential { providers: missing });
        }

        debug!(
            indicator = %indicator,
            algorithm = ?indicator.hash_algorithm(),
            sources = clients.len(),
            "Dispatching source lookups"
        );
        let responses = fan_out(&clients, &indicator, credentials, deadline).await;

        let report = assemble(&indicator, &responses)?;

        info!(
            indicator = %indicator,
            score = report.summary().score,
            verdict = %report.summary().verdict,
            degraded = report.degraded_sources().count(),
            "Analysis complete"
        );

        Ok(report)
    }

    fn applicable_clients(&self, kind: IndicatorKind) -> Vec<Arc<dyn SourceClient>> {
        self.clients
            .iter()
            .filter(|client| client.provider().supports(kind))
            .cloned()
            .collect()
    }
}

/// Credentialed providers among `clients` with no key, in client order.
fn missing_credentials(
    clients: &[Arc<dyn SourceClient>],
    credentials: &SourceCredentials,
) -> Vec<Provider> {
    clients
        .iter()
        .map(|client| client.provider())
        .filter(|provider| provider.requires_credential() && !credentials.contains(*provider))
        .collect()
}

/// Query every client concurrently and wait for all of them.
///
/// Each call runs in its own task under `deadline`. A call that overruns
/// or panics becomes a failure for that provider only.
async fn fan_out(
    clients: &[Arc<dyn SourceClient>],
    indicator: &Indicator,
    credentials: &SourceCredentials,
    deadline: Duration,
) -> Vec<SourceResponse> {
    let tasks = clients.iter().map(|client| {
        let client = Arc::clone(client);
        let provider = client.provider();
        let indicator = indicator.clone();
        let credential = credentials.get(provider).map(str::to_string);

        let handle = tokio::spawn(async move {
            let call = client.fetch(&indicator, credential.as_deref());
            match tokio::time::timeout(deadline, call).await {
                Ok(response) => response,
                Err(_) => SourceResponse::failed(provider, SourceFailure::Timeout),
            }
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                if e.is_panic() {
                    error!(provider = %provider, error = %e, "Source task panicked");
                } else {
                    error!(provider = %provider, error = %e, "Source task cancelled");
                }
                SourceResponse::failed(provider, SourceFailure::Internal)
            })
        }
    });

    join_all(tasks).await
}

/// Normalize, score and build the report from collected responses.
fn assemble(
    indicator: &Indicator,
    responses: &[SourceResponse],
) -> Result<AggregatedReport, AnalyzeError> {
    // With a single source there is nothing to degrade to.
    if let [only] = responses {
        if let Some(failure) = only.failure() {
            warn!(
                provider = %only.provider(),
                indicator = %indicator,
                error = %failure,
                "Sole source failed"
            );
            return Err(AnalyzeError::Source {
                provider: only.provider(),
                failure: failure.clone(),
            });
        }
    }

    let mut sources = BTreeMap::new();
    for response in responses {
        let provider = response.provider();
        let entry = match (normalize(indicator, response), response.failure()) {
            (Some(fields), _) => SourceEntry::ok(fields),
            (None, Some(failure)) => {
                warn!(
                    provider = %provider,
                    indicator = %indicator,
                    error = %failure,
                    "Source lookup failed, reporting degraded entry"
                );
                SourceEntry::degraded(provider, indicator, failure)
            }
            (None, None) => {
                return Err(AnalyzeError::Internal(format!(
                    "{} response could not be normalized",
                    provider
                )))
            }
        };
        sources.insert(provider, entry);
    }

    let signal = NormalizedSignal::from_sources(
        sources
            .values()
            .filter(|entry| !entry.is_degraded())
            .map(|entry| &entry.fields),
    );
    let assessment = scoring::assess(indicator.kind(), &signal)?;

    let attributes = responses.iter().find_map(|response| match response {
        SourceResponse::VirusTotal(Ok(attrs)) => Some(attrs),
        _ => None,
    });
    let (domain_info, file_info) = match (indicator.kind(), attributes) {
        (IndicatorKind::Domain, Some(attrs)) => (Some(DomainInfo::from_attributes(attrs)), None),
        (IndicatorKind::Hash, Some(attrs)) => (None, Some(FileInfo::from_attributes(attrs))),
        _ => (None, None),
    };

    Ok(AggregatedReport::new(
        Summary::new(indicator.kind(), &assessment),
        sources,
        domain_info,
        file_info,
    ))
}
