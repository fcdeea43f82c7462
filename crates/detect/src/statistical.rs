//! Statistical anomaly detector
//!
//! Sample statistics over the member's recent amounts plus a system-wide
//! volume-spike check. Abstains on the amount check until the member has
//! enough history for the sample moments to mean anything.

use finwatch_core::{
    most_severe, DetectionConfig, Severity, Signal, SignalKind, TierConfidence, Transaction,
};
use finwatch_profile::MemberProfile;

use crate::context::EvaluationContext;
use crate::Detector;

pub const RULE_AMOUNT_DEVIATION: &str = "SAMPLE_AMOUNT_DEVIATION";
pub const RULE_VOLUME_SPIKE: &str = "SYSTEM_VOLUME_SPIKE";

/// z-score over sample history and system volume spikes
pub struct StatisticalAnomalyDetector {
    min_history: usize,
    volume_spike_multiplier: f64,
    confidence: TierConfidence,
}

impl StatisticalAnomalyDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            min_history: config.min_history_statistical,
            volume_spike_multiplier: config.volume_spike_multiplier,
            confidence: config.tier_confidence,
        }
    }

    /// Amount deviation against sample mean/stddev of recent history
    fn check_amount(&self, tx: &Transaction, ctx: &EvaluationContext<'_>) -> Option<Signal> {
        if ctx.recent.len() < self.min_history {
            return None;
        }

        let amounts: Vec<f64> = ctx.recent.iter().map(|t| t.amount_f64()).collect();
        let n = amounts.len() as f64;
        let mean = amounts.iter().sum::<f64>() / n;
        let variance = amounts.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
        let stddev = variance.sqrt();
        if stddev == 0.0 {
            return None;
        }

        let z = (tx.amount_f64() - mean) / stddev;
        let magnitude = z.abs();
        if magnitude <= 2.0 {
            return None;
        }

        let severity = if magnitude > 4.0 {
            Severity::Critical
        } else if magnitude > 3.0 {
            Severity::High
        } else {
            Severity::Medium
        };

        Some(
            Signal::new(
                SignalKind::StatisticalAnomaly,
                severity,
                self.confidence.for_severity(severity),
                format!(
                    "Amount {} is {:.1} sigma from sample mean {:.2} over {} transactions",
                    tx.amount,
                    magnitude,
                    mean,
                    ctx.recent.len()
                ),
            )
            .with_rule(RULE_AMOUNT_DEVIATION),
        )
    }

    /// System-wide volume spike: trailing 24h vs the 30-day daily average
    fn check_volume_spike(&self, ctx: &EvaluationContext<'_>) -> Option<Signal> {
        let average = ctx.activity.daily_average_30d;
        if average <= 0.0 {
            return None;
        }

        let last_24h = ctx.activity.transactions_last_24h as f64;
        if last_24h <= average * self.volume_spike_multiplier {
            return None;
        }

        Some(
            Signal::new(
                SignalKind::StatisticalAnomaly,
                Severity::Medium,
                self.confidence.for_severity(Severity::Medium),
                format!(
                    "System volume {} in trailing 24h exceeds {:.1}x the 30-day daily average {:.1}",
                    ctx.activity.transactions_last_24h, self.volume_spike_multiplier, average
                ),
            )
            .with_rule(RULE_VOLUME_SPIKE),
        )
    }
}

impl Detector for StatisticalAnomalyDetector {
    fn name(&self) -> &str {
        "statistical_anomaly"
    }

    fn detect(
        &self,
        tx: &Transaction,
        _profile: &MemberProfile,
        ctx: &EvaluationContext<'_>,
    ) -> Option<Signal> {
        // Amount deviation declared first, so it wins ties
        let fired: Vec<Signal> = [self.check_amount(tx, ctx), self.check_volume_spike(ctx)]
            .into_iter()
            .flatten()
            .collect();

        most_severe(&fired).cloned()
    }
}
