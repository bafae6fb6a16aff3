//! Indicator Reputation Aggregator for Zentinel.
//!
//! Validates an IP address, file hash or domain, queries several threat
//! intelligence sources concurrently, and combines their answers into one
//! scored report.
//!
//! # Features
//!
//! - **Indicator Validation** - IPv4/IPv6, MD5/SHA-1/SHA-256 and domain names
//! - **vpnapi.io Integration** - VPN, proxy, Tor and hosting flags for IPs
//! - **VirusTotal Integration** - Engine votes for IPs, files and domains
//! - **AbuseIPDB Integration** - Abuse confidence and report counts for IPs
//! - **Geolocation** - Country, city and network owner via ipwho.is
//! - **Weighted Scoring** - 0-100 score with a verdict and recommendation
//! - **Partial Results** - A failing source degrades the report instead of aborting it
//!
//! # Example Configuration
//!
//! ```yaml
//! settings:
//!   deadline_ms: 10000
//!
//! credentials:
//!   vpnapi: "${VPNAPI_KEY}"
//!   virustotal: "${VIRUSTOTAL_KEY}"
//!   abuseipdb: "${ABUSEIPDB_KEY}"
//!
//! abuseipdb:
//!   max_age_days: 90
//!   timeout_ms: 5000
//! ```

pub mod analyzer;
pub mod config;
pub mod error;
pub mod indicator;
pub mod normalize;
pub mod providers;
pub mod report;
pub mod scoring;

pub use analyzer::ReputationAnalyzer;
pub use config::Config;
pub use error::{AnalyzeError, ErrorBody};
pub use indicator::{validate, Indicator, IndicatorKind, ValidationError};
pub use providers::{Provider, SourceClient, SourceCredentials, SourceFailure, SourceResponse};
pub use report::{AggregatedReport, SourceEntry, SourceStatus, Summary};
pub use scoring::Verdict;
