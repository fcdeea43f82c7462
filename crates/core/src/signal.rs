//! Detector signals with totally ordered severity
//!
//! Severity forms a total order `Low < Medium < High < Critical`.
//! Reduction of several signals to one is an explicit max-by-severity fold
//! where the FIRST signal wins ties - detectors declare their checks in
//! priority order and rely on this.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum_macros::{Display, EnumString};

/// Severity levels - ordered from lowest to highest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

/// Which detector family produced a signal
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SignalKind {
    Rule,
    StatisticalAnomaly,
    Behavioral,
    Peer,
}

/// Ephemeral detector output.
///
/// Signals are reduced to a single persisted Alert per transaction; they
/// carry a human-readable reason so reviewers see WHY something fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub severity: Severity,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl Signal {
    /// Create a signal, clamping confidence into [0, 1].
    pub fn new(
        kind: SignalKind,
        severity: Severity,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
            rule_id: None,
        }
    }

    /// Tag the signal with the rule identifier that produced it
    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }
}

/// Pick the most severe signal; the first one wins ties.
pub fn most_severe(signals: &[Signal]) -> Option<&Signal> {
    signals.iter().fold(None, |best, candidate| match best {
        None => Some(candidate),
        // Strict > keeps the earlier signal on equal severity
        Some(current) if candidate.severity > current.severity => Some(candidate),
        Some(current) => Some(current),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(kind: SignalKind, severity: Severity, reason: &str) -> Signal {
        Signal::new(kind, severity, 0.8, reason)
    }

    #[test]
    fn test_severity_total_order() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_confidence_clamped() {
        let s = Signal::new(SignalKind::Rule, Severity::Low, 1.7, "x");
        assert_eq!(s.confidence, 1.0);
        let s = Signal::new(SignalKind::Rule, Severity::Low, -0.2, "x");
        assert_eq!(s.confidence, 0.0);
    }

    #[test]
    fn test_most_severe_empty() {
        assert!(most_severe(&[]).is_none());
    }

    #[test]
    fn test_most_severe_picks_maximum() {
        let signals = vec![
            signal(SignalKind::Rule, Severity::Medium, "a"),
            signal(SignalKind::Behavioral, Severity::Critical, "b"),
            signal(SignalKind::Peer, Severity::High, "c"),
        ];
        let winner = most_severe(&signals).unwrap();
        assert_eq!(winner.severity, Severity::Critical);
        assert_eq!(winner.reason, "b");
    }

    #[test]
    fn test_most_severe_first_wins_ties() {
        let signals = vec![
            signal(SignalKind::Rule, Severity::High, "declared-first"),
            signal(SignalKind::StatisticalAnomaly, Severity::High, "declared-second"),
        ];
        let winner = most_severe(&signals).unwrap();
        assert_eq!(winner.reason, "declared-first");
    }

    #[test]
    fn test_severity_serialization() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");

        let parsed: Severity = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(parsed, Severity::High);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SignalKind::StatisticalAnomaly.to_string(), "statistical_anomaly");
        let parsed: SignalKind = "peer".parse().unwrap();
        assert_eq!(parsed, SignalKind::Peer);
    }
}
