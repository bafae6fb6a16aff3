//! Threat scoring.
//!
//! IP indicators blend three independent sources so that no single source
//! can flip the verdict alone. Hash and domain indicators are scored on the
//! VirusTotal detection ratio only.

use crate::indicator::IndicatorKind;
use crate::normalize::NormalizedSignal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Final classification of an indicator.
///
/// `Safe` is the benign verdict for IPs, `Clean` the benign verdict for
/// hashes and domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Verdict {
    Safe,
    Clean,
    Suspicious,
    Malicious,
}

impl Verdict {
    /// Benign verdict for the indicator kind.
    pub fn benign(kind: IndicatorKind) -> Self {
        match kind {
            IndicatorKind::Ip => Verdict::Safe,
            IndicatorKind::Hash | IndicatorKind::Domain => Verdict::Clean,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Safe => "Safe",
            Verdict::Clean => "Clean",
            Verdict::Suspicious => "Suspicious",
            Verdict::Malicious => "Malicious",
        }
    }

    /// Returns true if this verdict is more severe than the other.
    pub fn is_more_severe_than(&self, other: &Verdict) -> bool {
        self.severity() > other.severity()
    }

    fn severity(&self) -> u8 {
        match self {
            Verdict::Safe | Verdict::Clean => 0,
            Verdict::Suspicious => 1,
            Verdict::Malicious => 2,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weight of each signal in the blended score. Weights sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub malicious_vote_percent: f64,
    pub abuse_confidence_percent: f64,
    pub vpn_flag_ratio: f64,
    pub detection_ratio: f64,
}

impl ScoreWeights {
    /// 50% VirusTotal votes, 30% AbuseIPDB confidence, 20% vpnapi flags.
    pub const IP: ScoreWeights = ScoreWeights {
        malicious_vote_percent: 0.5,
        abuse_confidence_percent: 0.3,
        vpn_flag_ratio: 0.2,
        detection_ratio: 0.0,
    };

    /// Detection ratio alone.
    pub const DETECTION: ScoreWeights = ScoreWeights {
        malicious_vote_percent: 0.0,
        abuse_confidence_percent: 0.0,
        vpn_flag_ratio: 0.0,
        detection_ratio: 1.0,
    };

    pub fn for_kind(kind: IndicatorKind) -> Self {
        match kind {
            IndicatorKind::Ip => Self::IP,
            IndicatorKind::Hash | IndicatorKind::Domain => Self::DETECTION,
        }
    }

    pub fn sum(&self) -> f64 {
        self.malicious_vote_percent
            + self.abuse_confidence_percent
            + self.vpn_flag_ratio
            + self.detection_ratio
    }

    /// Weighted sum of the signals, before clamping and rounding.
    pub fn apply(&self, signal: &NormalizedSignal) -> f64 {
        signal.malicious_vote_percent * self.malicious_vote_percent
            + signal.abuse_confidence_percent * self.abuse_confidence_percent
            + signal.vpn_flag_ratio * self.vpn_flag_ratio
            + f64::from(signal.detection_ratio) * self.detection_ratio
    }
}

/// Lower bounds (inclusive) of the non-benign verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub malicious: u8,
    pub suspicious: u8,
}

impl Thresholds {
    pub const IP: Thresholds = Thresholds {
        malicious: 75,
        suspicious: 40,
    };

    pub const DETECTION: Thresholds = Thresholds {
        malicious: 50,
        suspicious: 10,
    };

    pub fn for_kind(kind: IndicatorKind) -> Self {
        match kind {
            IndicatorKind::Ip => Self::IP,
            IndicatorKind::Hash | IndicatorKind::Domain => Self::DETECTION,
        }
    }
}

/// Scoring produced a value that cannot be reported.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("score is not a finite number ({0})")]
    NonFinite(f64),
}

/// Score, verdict and recommendation for one indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub score: u8,
    pub verdict: Verdict,
    pub recommendation: &'static str,
}

/// Combine signals into a 0-100 score.
pub fn score(kind: IndicatorKind, signal: &NormalizedSignal) -> Result<u8, ScoringError> {
    let raw = ScoreWeights::for_kind(kind).apply(signal);
    if !raw.is_finite() {
        return Err(ScoringError::NonFinite(raw));
    }
    Ok(raw.clamp(0.0, 100.0).round() as u8)
}

/// Map a score onto a verdict.
pub fn verdict(kind: IndicatorKind, score: u8) -> Verdict {
    let thresholds = Thresholds::for_kind(kind);
    if score >= thresholds.malicious {
        Verdict::Malicious
    } else if score >= thresholds.suspicious {
        Verdict::Suspicious
    } else {
        Verdict::benign(kind)
    }
}

/// Fixed advice text for a verdict.
pub fn recommendation(kind: IndicatorKind, verdict: Verdict) -> &'static str {
    match (kind, verdict) {
        (IndicatorKind::Ip, Verdict::Malicious) => {
            "Block this IP immediately and investigate sources of traffic."
        }
        (IndicatorKind::Ip, Verdict::Suspicious) => {
            "Monitor connections closely; consider blocking if activity persists."
        }
        (IndicatorKind::Ip, _) => "No immediate action required; continue normal monitoring.",
        (IndicatorKind::Hash, Verdict::Malicious) => "Block or quarantine this file immediately.",
        (IndicatorKind::Hash, Verdict::Suspicious) => "Quarantine and run further analysis.",
        (IndicatorKind::Domain, Verdict::Malicious) => "Block this domain immediately.",
        (IndicatorKind::Domain, Verdict::Suspicious) => {
            "Monitor and restrict access to this domain."
        }
        (IndicatorKind::Hash | IndicatorKind::Domain, _) => "No known threats detected.",
    }
}

/// Score an indicator and derive its verdict and recommendation.
pub fn assess(kind: IndicatorKind, signal: &NormalizedSignal) -> Result<Assessment, ScoringError> {
    let score = score(kind, signal)?;
    let verdict = verdict(kind, score);
    Ok(Assessment {
        score,
        verdict,
        recommendation: recommendation(kind, verdict),
    })
}
