//! Request-level errors.

use crate::indicator::ValidationError;
use crate::providers::{Provider, SourceFailure};
use crate::scoring::ScoringError;
use serde::Serialize;
use thiserror::Error;

/// Why an analysis produced no report.
///
/// Single-source failures normally end up inside the report as degraded
/// entries; they only surface here when that source was the sole signal.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Malformed indicator.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Caller did not supply keys for these providers. No call was made.
    #[error("Missing API key for {}", join(.providers))]
    MissingCredential { providers: Vec<Provider> },

    /// The only source for this indicator kind failed.
    #[error("{provider} lookup failed: {failure}")]
    Source {
        provider: Provider,
        failure: SourceFailure,
    },

    /// Unexpected fault while normalizing, scoring or assembling.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalyzeError {
    /// HTTP status a routing layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AnalyzeError::Validation(_) | AnalyzeError::MissingCredential { .. } => 400,
            AnalyzeError::Source { failure, .. } => match failure {
                SourceFailure::Timeout => 504,
                SourceFailure::Internal => 500,
                other => other.upstream_status().unwrap_or(502),
            },
            AnalyzeError::Internal(_) => 500,
        }
    }

    /// Caller-facing error object. Internal detail stays in the logs.
    pub fn to_body(&self) -> ErrorBody {
        let error = match self {
            AnalyzeError::Validation(e) => e.reason.clone(),
            AnalyzeError::MissingCredential { .. } => self.to_string(),
            AnalyzeError::Source { provider, .. } => format!("Failed to fetch from {}", provider),
            AnalyzeError::Internal(_) => "Failed to analyze indicator".to_string(),
        };
        ErrorBody { error }
    }
}

impl From<ScoringError> for AnalyzeError {
    fn from(e: ScoringError) -> Self {
        AnalyzeError::Internal(e.to_string())
    }
}

/// `{ "error": "..." }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn join(providers: &[Provider]) -> String {
    providers
        .iter()
        .map(Provider::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
