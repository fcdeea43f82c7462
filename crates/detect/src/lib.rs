//! FinWatch detectors - deterministic fraud signal evaluation
//!
//! Four independent detectors, each a pure function of
//! `(transaction, profile, context)`:
//! - [`RuleBasedDetector`] - explicit rule checks in priority order
//! - [`StatisticalAnomalyDetector`] - z-score and volume-spike statistics
//! - [`BehavioralDriftDetector`] - drift from the member's own habits
//! - [`PeerComparisonDetector`] - risk relative to similar members
//!
//! A detector either fires with exactly one [`Signal`] or abstains with
//! `None` (including the insufficient-history case - abstention is silent).
//! No detector reads the wall clock; the transaction's own timestamp is the
//! only time input, which keeps evaluation deterministic and testable.

pub mod behavioral;
pub mod context;
pub mod peer;
pub mod rules;
pub mod statistical;

pub use behavioral::BehavioralDriftDetector;
pub use context::{EvaluationContext, SystemActivity};
pub use peer::PeerComparisonDetector;
pub use rules::RuleBasedDetector;
pub use statistical::StatisticalAnomalyDetector;

use finwatch_core::{DetectionConfig, Signal, Transaction};
use finwatch_profile::MemberProfile;

/// A side-effect-free signal detector.
///
/// Implementations must be deterministic given identical inputs.
pub trait Detector: Send + Sync {
    /// Detector name for logging/debugging
    fn name(&self) -> &str;

    /// Evaluate one transaction. `None` means the detector abstained.
    fn detect(
        &self,
        tx: &Transaction,
        profile: &MemberProfile,
        ctx: &EvaluationContext<'_>,
    ) -> Option<Signal>;
}

/// Runs every registered detector over a transaction.
pub struct DetectionEngine {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectionEngine {
    /// Engine with the four standard detectors
    pub fn with_defaults(config: &DetectionConfig) -> Self {
        Self {
            detectors: vec![
                Box::new(RuleBasedDetector::new(config)),
                Box::new(StatisticalAnomalyDetector::new(config)),
                Box::new(BehavioralDriftDetector::new(config)),
                Box::new(PeerComparisonDetector::new(config)),
            ],
        }
    }

    /// Engine with a custom detector set
    pub fn new(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { detectors }
    }

    /// Run all detectors; abstentions are dropped.
    pub fn run(
        &self,
        tx: &Transaction,
        profile: &MemberProfile,
        ctx: &EvaluationContext<'_>,
    ) -> Vec<Signal> {
        let mut signals = Vec::new();
        for detector in &self.detectors {
            match detector.detect(tx, profile, ctx) {
                Some(signal) => {
                    tracing::debug!(
                        detector = detector.name(),
                        severity = %signal.severity,
                        "detector fired"
                    );
                    signals.push(signal);
                }
                None => {
                    tracing::debug!(detector = detector.name(), "detector abstained");
                }
            }
        }
        signals
    }
}
