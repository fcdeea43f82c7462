//! FinWatch risk aggregation
//!
//! Turns the set of fired signals into:
//! - a composite 0-100 score driving the hold-vs-pass decision at ingestion
//! - the single most severe signal that becomes the persisted Alert
//! - a longitudinal per-member risk score blended from alert density
//!
//! The severity weighting is configuration data (`ScoreWeights`), not
//! branching logic, so thresholds can be tuned without touching detectors.

use finwatch_core::{
    most_severe, DetectionConfig, LongitudinalWeights, ScoreWeights, Signal,
};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Outcome of the hold-vs-pass decision at ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IngestStatus {
    /// Score at or above the hold threshold - transaction held for review
    Held,
    /// Below the hold threshold - transaction passes
    Passed,
}

/// Aggregates detector signals into actionable verdicts
pub struct RiskAggregator {
    weights: ScoreWeights,
    hold_threshold: f64,
    longitudinal: LongitudinalWeights,
}

impl RiskAggregator {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            weights: config.score_weights,
            hold_threshold: config.hold_threshold,
            longitudinal: config.longitudinal,
        }
    }

    /// Composite score: `min(100, sum(weight(severity) * confidence))`
    pub fn composite_score(&self, signals: &[Signal]) -> f64 {
        let raw: f64 = signals
            .iter()
            .map(|s| self.weights.weight(s.severity) * s.confidence)
            .sum();
        raw.min(100.0)
    }

    /// Hold-vs-pass decision for a composite score
    pub fn status_for(&self, score: f64) -> IngestStatus {
        if score >= self.hold_threshold {
            IngestStatus::Held
        } else {
            IngestStatus::Passed
        }
    }

    /// The single signal that becomes the Alert: max severity, first wins ties
    pub fn fuse<'a>(&self, signals: &'a [Signal]) -> Option<&'a Signal> {
        most_severe(signals)
    }

    /// Longitudinal member risk from alert-ledger statistics, clamped to [0, 1].
    ///
    /// `alert_rate` is alerts per ingested transaction; the remaining inputs
    /// are fractions of the member's total alerts.
    pub fn longitudinal_score(
        &self,
        alerts_total: u64,
        alerts_critical: u64,
        alerts_high: u64,
        alerts_unreviewed: u64,
        transaction_count: u64,
    ) -> f64 {
        if alerts_total == 0 || transaction_count == 0 {
            return 0.0;
        }

        let total = alerts_total as f64;
        let alert_rate = (total / transaction_count as f64).min(1.0);
        let critical_fraction = alerts_critical as f64 / total;
        let high_fraction = alerts_high as f64 / total;
        let unreviewed_fraction = alerts_unreviewed as f64 / total;

        let w = &self.longitudinal;
        let blended = w.alert_rate * alert_rate
            + w.critical_fraction * critical_fraction
            + w.high_fraction * high_fraction
            + w.unreviewed_fraction * unreviewed_fraction;

        blended.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finwatch_core::{Severity, SignalKind};

    fn aggregator() -> RiskAggregator {
        RiskAggregator::new(&DetectionConfig::default())
    }

    fn signal(severity: Severity, confidence: f64) -> Signal {
        Signal::new(SignalKind::Rule, severity, confidence, "test")
    }

    #[test]
    fn test_empty_signals_score_zero() {
        let agg = aggregator();
        assert_eq!(agg.composite_score(&[]), 0.0);
        assert_eq!(agg.status_for(0.0), IngestStatus::Passed);
    }

    #[test]
    fn test_weighted_sum() {
        let agg = aggregator();
        // 25 * 0.8 + 50 * 0.5 = 45
        let signals = vec![signal(Severity::Medium, 0.8), signal(Severity::High, 0.5)];
        let score = agg.composite_score(&signals);
        assert!((score - 45.0).abs() < 1e-9);
        assert_eq!(agg.status_for(score), IngestStatus::Passed);
    }

    #[test]
    fn test_score_saturates_at_100() {
        let agg = aggregator();
        let signals = vec![
            signal(Severity::Critical, 1.0),
            signal(Severity::Critical, 1.0),
        ];
        assert_eq!(agg.composite_score(&signals), 100.0);
    }

    #[test]
    fn test_hold_at_threshold() {
        let agg = aggregator();
        assert_eq!(agg.status_for(50.0), IngestStatus::Held);
        assert_eq!(agg.status_for(49.9), IngestStatus::Passed);
        assert_eq!(agg.status_for(99.0), IngestStatus::Held);
    }

    #[test]
    fn test_fuse_first_wins_ties() {
        let agg = aggregator();
        let signals = vec![
            Signal::new(SignalKind::Rule, Severity::High, 0.8, "first"),
            Signal::new(SignalKind::Behavioral, Severity::High, 0.9, "second"),
        ];
        assert_eq!(agg.fuse(&signals).unwrap().reason, "first");
    }

    #[test]
    fn test_longitudinal_zero_without_alerts() {
        let agg = aggregator();
        assert_eq!(agg.longitudinal_score(0, 0, 0, 0, 100), 0.0);
        assert_eq!(agg.longitudinal_score(5, 1, 1, 1, 0), 0.0);
    }

    #[test]
    fn test_longitudinal_blend() {
        let agg = aggregator();
        // 10 alerts over 100 transactions, 2 critical, 3 high, 4 unreviewed
        // 0.4*0.1 + 0.25*0.2 + 0.2*0.3 + 0.15*0.4 = 0.21
        let score = agg.longitudinal_score(10, 2, 3, 4, 100);
        assert!((score - 0.21).abs() < 1e-9);
    }

    #[test]
    fn test_longitudinal_clamped() {
        let agg = aggregator();
        // Every transaction alerted, all critical, all unreviewed
        let score = agg.longitudinal_score(50, 50, 0, 50, 50);
        assert!(score <= 1.0);
        assert!(score > 0.0);
    }
}
