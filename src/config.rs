//! Configuration types for the indicator reputation aggregator.

use crate::providers::{Provider, SourceCredentials};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global settings.
    #[serde(default)]
    pub settings: Settings,

    /// Default API keys, used when the caller supplies none.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// vpnapi.io client.
    #[serde(default)]
    pub vpnapi: VpnApiConfig,

    /// VirusTotal client.
    #[serde(default)]
    pub virustotal: VirusTotalConfig,

    /// AbuseIPDB client.
    #[serde(default)]
    pub abuseipdb: AbuseIpdbConfig,

    /// ipwho.is client.
    #[serde(default)]
    pub iplocation: IpLocationConfig,
}

/// Global settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Deadline for each source call within one analysis, in milliseconds.
    #[serde(default = "default_deadline")]
    pub deadline_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline(),
        }
    }
}

fn default_deadline() -> u64 {
    10_000
}

/// API keys (support ${ENV_VAR} syntax). Empty means "not configured".
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub vpnapi: String,

    #[serde(default)]
    pub virustotal: String,

    #[serde(default)]
    pub abuseipdb: String,
}

/// vpnapi.io client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VpnApiConfig {
    #[serde(default = "default_vpnapi_url")]
    pub base_url: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for VpnApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_vpnapi_url(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_vpnapi_url() -> String {
    "https://vpnapi.io".to_string()
}

/// VirusTotal client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VirusTotalConfig {
    #[serde(default = "default_virustotal_url")]
    pub base_url: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for VirusTotalConfig {
    fn default() -> Self {
        Self {
            base_url: default_virustotal_url(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_virustotal_url() -> String {
    "https://www.virustotal.com".to_string()
}

/// AbuseIPDB client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AbuseIpdbConfig {
    #[serde(default = "default_abuseipdb_url")]
    pub base_url: String,

    /// Only consider reports from the last N days.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for AbuseIpdbConfig {
    fn default() -> Self {
        Self {
            base_url: default_abuseipdb_url(),
            max_age_days: default_max_age_days(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_abuseipdb_url() -> String {
    "https://api.abuseipdb.com".to_string()
}

fn default_max_age_days() -> u32 {
    90
}

/// ipwho.is client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IpLocationConfig {
    #[serde(default = "default_iplocation_url")]
    pub base_url: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for IpLocationConfig {
    fn default() -> Self {
        Self {
            base_url: default_iplocation_url(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_iplocation_url() -> String {
    "https://ipwho.is".to_string()
}

fn default_timeout() -> u64 {
    5000
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding ${VAR} references.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(content);
        // An empty document deserializes as unit, not as an empty mapping.
        let config: Config = if expanded.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&expanded)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.settings.deadline_ms == 0 {
            anyhow::bail!("settings.deadline_ms must be greater than 0");
        }

        let clients = [
            ("vpnapi", &self.vpnapi.base_url, self.vpnapi.timeout_ms),
            ("virustotal", &self.virustotal.base_url, self.virustotal.timeout_ms),
            ("abuseipdb", &self.abuseipdb.base_url, self.abuseipdb.timeout_ms),
            ("iplocation", &self.iplocation.base_url, self.iplocation.timeout_ms),
        ];

        for (name, base_url, timeout_ms) in clients {
            if timeout_ms == 0 {
                anyhow::bail!("{}.timeout_ms must be greater than 0", name);
            }
            if let Err(e) = reqwest::Url::parse(base_url) {
                anyhow::bail!("{}.base_url '{}' is invalid: {}", name, base_url, e);
            }
        }

        // AbuseIPDB accepts 1-365
        if !(1..=365).contains(&self.abuseipdb.max_age_days) {
            anyhow::bail!(
                "abuseipdb.max_age_days ({}) must be between 1 and 365",
                self.abuseipdb.max_age_days
            );
        }

        Ok(())
    }

    /// Per-call deadline.
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.settings.deadline_ms)
    }

    /// Configured keys as per-request credentials.
    pub fn source_credentials(&self) -> SourceCredentials {
        SourceCredentials::new()
            .with(Provider::VpnApi, self.credentials.vpnapi.as_str())
            .with(Provider::VirusTotal, self.credentials.virustotal.as_str())
            .with(Provider::AbuseIpdb, self.credentials.abuseipdb.as_str())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# Indicator Reputation Configuration

settings:
  deadline_ms: 10000           # Per-source deadline for one analysis

# Default API keys (used when none are passed on the command line)
credentials:
  vpnapi: "${VPNAPI_KEY}"
  virustotal: "${VIRUSTOTAL_KEY}"
  abuseipdb: "${ABUSEIPDB_KEY}"

# vpnapi.io - VPN/proxy/Tor/hosting flags (IP only)
vpnapi:
  base_url: "https://vpnapi.io"
  timeout_ms: 5000

# VirusTotal - engine votes and reputation (IP, hash, domain)
virustotal:
  base_url: "https://www.virustotal.com"
  timeout_ms: 5000

# AbuseIPDB - abuse confidence and report count (IP only)
abuseipdb:
  base_url: "https://api.abuseipdb.com"
  max_age_days: 90             # Only consider reports from last 90 days
  timeout_ms: 5000

# ipwho.is - geolocation (IP only, no key required)
iplocation:
  base_url: "https://ipwho.is"
  timeout_ms: 5000
"#
        .to_string()
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let var_value = std::env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.settings.deadline_ms, 10_000);
        assert_eq!(config.deadline(), Duration::from_secs(10));
        assert_eq!(config.abuseipdb.max_age_days, 90);
        assert_eq!(config.virustotal.base_url, "https://www.virustotal.com");
        assert_eq!(config.iplocation.timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_REPUTATION_API_KEY", "secret123");
        let input = "virustotal: \"${TEST_REPUTATION_API_KEY}\"";
        let result = expand_env_vars(input);
        assert_eq!(result, "virustotal: \"secret123\"");
        std::env::remove_var("TEST_REPUTATION_API_KEY");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let input = "api_key: \"${NONEXISTENT_REPUTATION_VAR}\"";
        let result = expand_env_vars(input);
        assert_eq!(result, "api_key: \"\"");
    }

    #[test]
    fn test_parse_config_yaml() {
        let yaml = r#"
settings:
  deadline_ms: 2500

credentials:
  virustotal: "vt-key"

abuseipdb:
  max_age_days: 30
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.settings.deadline_ms, 2500);
        assert_eq!(config.abuseipdb.max_age_days, 30);
        assert_eq!(config.abuseipdb.timeout_ms, 5000);

        let creds = config.source_credentials();
        assert_eq!(creds.get(Provider::VirusTotal), Some("vt-key"));
        assert!(!creds.contains(Provider::VpnApi));
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.settings.deadline_ms, 10_000);
    }

    #[test]
    fn test_example_parses() {
        let config = Config::from_yaml(&Config::example()).unwrap();
        assert_eq!(config.vpnapi.base_url, "https://vpnapi.io");
        assert_eq!(config.iplocation.base_url, "https://ipwho.is");
    }

    #[test]
    fn test_validate_zero_deadline() {
        let mut config = Config::default();
        config.settings.deadline_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.vpnapi.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_url() {
        let mut config = Config::default();
        config.virustotal.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_max_age_days() {
        let mut config = Config::default();
        config.abuseipdb.max_age_days = 0;
        assert!(config.validate().is_err());

        config.abuseipdb.max_age_days = 366;
        assert!(config.validate().is_err());

        config.abuseipdb.max_age_days = 365;
        assert!(config.validate().is_ok());
    }
}
