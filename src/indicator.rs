//! Indicator parsing and syntactic validation.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static IPV4_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(25[0-5]|2[0-4][0-9]|1?[0-9]{1,2})(\.(25[0-5]|2[0-4][0-9]|1?[0-9]{1,2})){3}$").unwrap()
});

// Full, compressed, link-local with zone ID, IPv4-mapped and IPv4-embedded forms.
static IPV6_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(",
        r"([0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}",
        r"|([0-9a-fA-F]{1,4}:){1,7}:",
        r"|([0-9a-fA-F]{1,4}:){1,6}:[0-9a-fA-F]{1,4}",
        r"|([0-9a-fA-F]{1,4}:){1,5}(:[0-9a-fA-F]{1,4}){1,2}",
        r"|([0-9a-fA-F]{1,4}:){1,4}(:[0-9a-fA-F]{1,4}){1,3}",
        r"|([0-9a-fA-F]{1,4}:){1,3}(:[0-9a-fA-F]{1,4}){1,4}",
        r"|([0-9a-fA-F]{1,4}:){1,2}(:[0-9a-fA-F]{1,4}){1,5}",
        r"|[0-9a-fA-F]{1,4}:(:[0-9a-fA-F]{1,4}){1,6}",
        r"|:((:[0-9a-fA-F]{1,4}){1,7}|:)",
        r"|fe80:(:[0-9a-fA-F]{0,4}){0,4}%[0-9a-zA-Z]+",
        r"|::(ffff(:0{1,4})?:)?((25[0-5]|(2[0-4]|1?[0-9])?[0-9])\.){3}(25[0-5]|(2[0-4]|1?[0-9])?[0-9])",
        r"|([0-9a-fA-F]{1,4}:){1,4}:((25[0-5]|(2[0-4]|1?[0-9])?[0-9])\.){3}(25[0-5]|(2[0-4]|1?[0-9])?[0-9])",
        r")$"
    ))
    .unwrap()
});

static DOMAIN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z0-9_-]+\.)+[a-zA-Z]{2,}$").unwrap());

/// Kind of indicator being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Ip,
    Hash,
    Domain,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Ip => "ip",
            IndicatorKind::Hash => "hash",
            IndicatorKind::Domain => "domain",
        }
    }

    /// Human-readable subject used in validation messages.
    fn subject(&self) -> &'static str {
        match self {
            IndicatorKind::Ip => "IP address",
            IndicatorKind::Hash => "Hash",
            IndicatorKind::Domain => "Domain",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown indicator kind name.
#[derive(Debug, Error)]
#[error("unknown indicator kind '{0}' (expected ip, hash or domain)")]
pub struct UnknownKind(String);

impl FromStr for IndicatorKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ip" => Ok(IndicatorKind::Ip),
            "hash" => Ok(IndicatorKind::Hash),
            "domain" => Ok(IndicatorKind::Domain),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// Digest algorithm implied by a hash indicator's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    fn from_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(HashAlgorithm::Md5),
            40 => Some(HashAlgorithm::Sha1),
            64 => Some(HashAlgorithm::Sha256),
            _ => None,
        }
    }
}

/// Indicator rejected by syntactic validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ValidationError {
    pub reason: String,
}

impl ValidationError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A validated indicator. Only constructible through [`Indicator::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicator {
    kind: IndicatorKind,
    value: String,
}

impl Indicator {
    /// Validate `raw` as an indicator of the given kind.
    pub fn parse(kind: IndicatorKind, raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::new(format!("{} is required", kind.subject())));
        }

        let valid = match kind {
            IndicatorKind::Ip => is_valid_ip(raw),
            IndicatorKind::Hash => is_valid_hash(raw),
            IndicatorKind::Domain => is_valid_domain(raw),
        };

        if !valid {
            return Err(ValidationError::new(format!(
                "Invalid {} format",
                match kind {
                    IndicatorKind::Ip => "IP address",
                    IndicatorKind::Hash => "hash",
                    IndicatorKind::Domain => "domain",
                }
            )));
        }

        Ok(Self {
            kind,
            value: raw.to_string(),
        })
    }

    pub fn kind(&self) -> IndicatorKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Digest algorithm for hash indicators, `None` for other kinds.
    pub fn hash_algorithm(&self) -> Option<HashAlgorithm> {
        match self.kind {
            IndicatorKind::Hash => HashAlgorithm::from_len(self.value.len()),
            _ => None,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Validate `raw` as an indicator of the given kind.
pub fn validate(kind: IndicatorKind, raw: &str) -> Result<Indicator, ValidationError> {
    Indicator::parse(kind, raw)
}

fn is_valid_ip(value: &str) -> bool {
    IPV4_REGEX.is_match(value) || IPV6_REGEX.is_match(value)
}

fn is_valid_hash(value: &str) -> bool {
    HashAlgorithm::from_len(value.len()).is_some()
        && value.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_valid_domain(value: &str) -> bool {
    !value.starts_with("://") && DOMAIN_REGEX.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_accepts_dotted_quads() {
        for ip in ["0.0.0.0", "8.8.8.8", "192.168.1.1", "255.255.255.255", "10.0.100.249"] {
            assert!(validate(IndicatorKind::Ip, ip).is_ok(), "{ip} should be valid");
        }
    }

    #[test]
    fn test_ipv4_every_octet_value() {
        for octet in 0..=255u16 {
            let ip = format!("{octet}.{octet}.{octet}.{octet}");
            assert!(validate(IndicatorKind::Ip, &ip).is_ok(), "{ip} should be valid");
        }
        for octet in [256u16, 300, 999] {
            let ip = format!("1.2.3.{octet}");
            assert!(validate(IndicatorKind::Ip, &ip).is_err(), "{ip} should be invalid");
        }
    }

    #[test]
    fn test_ipv4_rejects_wrong_segment_count() {
        for ip in ["1.2.3", "1.2.3.4.5", "1..2.3", "1.2.3.", ".1.2.3", "a.b.c.d"] {
            assert!(validate(IndicatorKind::Ip, ip).is_err(), "{ip} should be invalid");
        }
    }

    #[test]
    fn test_ipv6_forms() {
        for ip in [
            "2001:0db8:85a3:0000:0000:8a2e:0370:7334",
            "2001:db8::1",
            "::1",
            "::",
            "fe80::1%eth0",
            "::ffff:192.168.1.1",
            "64:ff9b::192.0.2.33",
        ] {
            assert!(validate(IndicatorKind::Ip, ip).is_ok(), "{ip} should be valid");
        }

        for ip in [":::", "12345::1", "1:2:3:4:5:6:7:8:9", "gggg::1", "::ffff:999.1.1.1"] {
            assert!(validate(IndicatorKind::Ip, ip).is_err(), "{ip} should be invalid");
        }
    }

    #[test]
    fn test_hash_lengths() {
        for len in [32, 40, 64] {
            let lower = "a".repeat(len);
            let mixed = "aB3f".repeat(len / 4);
            assert!(validate(IndicatorKind::Hash, &lower).is_ok());
            assert!(validate(IndicatorKind::Hash, &mixed).is_ok());
        }

        for len in [0, 1, 31, 33, 39, 41, 63, 65, 128] {
            let hash = "f".repeat(len);
            assert!(validate(IndicatorKind::Hash, &hash).is_err(), "len {len} should be invalid");
        }
    }

    #[test]
    fn test_hash_rejects_non_hex() {
        let hash = format!("{}g", "a".repeat(31));
        assert!(validate(IndicatorKind::Hash, &hash).is_err());
    }

    #[test]
    fn test_hash_algorithm() {
        let md5 = validate(IndicatorKind::Hash, &"0".repeat(32)).unwrap();
        let sha1 = validate(IndicatorKind::Hash, &"0".repeat(40)).unwrap();
        let sha256 = validate(IndicatorKind::Hash, &"0".repeat(64)).unwrap();
        assert_eq!(md5.hash_algorithm(), Some(HashAlgorithm::Md5));
        assert_eq!(sha1.hash_algorithm(), Some(HashAlgorithm::Sha1));
        assert_eq!(sha256.hash_algorithm(), Some(HashAlgorithm::Sha256));

        let ip = validate(IndicatorKind::Ip, "1.1.1.1").unwrap();
        assert_eq!(ip.hash_algorithm(), None);
    }

    #[test]
    fn test_domains() {
        for domain in [
            "example.com",
            "sub.example.co.uk",
            "my_host.example.org",
            "xn--80ak6aa92e.com",
        ] {
            assert!(validate(IndicatorKind::Domain, domain).is_ok(), "{domain} should be valid");
        }

        for domain in [
            "localhost",
            "example.c0m",
            "://example.com",
            "example.com.",
            "exa mple.com",
            "example.c",
        ] {
            assert!(validate(IndicatorKind::Domain, domain).is_err(), "{domain} should be invalid");
        }
    }

    #[test]
    fn test_empty_input_reasons() {
        assert_eq!(
            validate(IndicatorKind::Ip, "").unwrap_err().reason,
            "IP address is required"
        );
        assert_eq!(
            validate(IndicatorKind::Hash, "").unwrap_err().reason,
            "Hash is required"
        );
        assert_eq!(
            validate(IndicatorKind::Domain, "").unwrap_err().reason,
            "Domain is required"
        );
    }

    #[test]
    fn test_invalid_format_reasons() {
        assert_eq!(
            validate(IndicatorKind::Ip, "999.1.1.1").unwrap_err().reason,
            "Invalid IP address format"
        );
        assert_eq!(
            validate(IndicatorKind::Hash, "abc").unwrap_err().reason,
            "Invalid hash format"
        );
        assert_eq!(
            validate(IndicatorKind::Domain, "nodots").unwrap_err().reason,
            "Invalid domain format"
        );
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("ip".parse::<IndicatorKind>().unwrap(), IndicatorKind::Ip);
        assert_eq!("HASH".parse::<IndicatorKind>().unwrap(), IndicatorKind::Hash);
        assert_eq!("Domain".parse::<IndicatorKind>().unwrap(), IndicatorKind::Domain);
        assert!("url".parse::<IndicatorKind>().is_err());
    }

    #[test]
    fn test_indicator_accessors() {
        let indicator = validate(IndicatorKind::Domain, "example.com").unwrap();
        assert_eq!(indicator.kind(), IndicatorKind::Domain);
        assert_eq!(indicator.value(), "example.com");
        assert_eq!(indicator.to_string(), "domain:example.com");
    }
}
