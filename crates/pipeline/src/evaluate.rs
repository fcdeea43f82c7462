//! Pure evaluation of one transaction
//!
//! `Evaluator` couples the detector set with the risk aggregator. It has no
//! store access and no clock: identical inputs always produce identical
//! output, which is the contract the ingestion endpoint relies on.

use finwatch_core::{DetectionConfig, Signal, Transaction};
use finwatch_detect::{DetectionEngine, EvaluationContext};
use finwatch_profile::MemberProfile;
use finwatch_risk::{IngestStatus, RiskAggregator};

/// Result of evaluating one transaction against all detectors
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub signals: Vec<Signal>,
    pub aggregate_score: f64,
    pub status: IngestStatus,
}

/// Detectors plus aggregation, as one pure unit
pub struct Evaluator {
    engine: DetectionEngine,
    aggregator: RiskAggregator,
}

impl Evaluator {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            engine: DetectionEngine::with_defaults(config),
            aggregator: RiskAggregator::new(config),
        }
    }

    pub fn aggregator(&self) -> &RiskAggregator {
        &self.aggregator
    }

    /// Run all detectors and derive the composite verdict.
    pub fn evaluate(
        &self,
        tx: &Transaction,
        profile: &MemberProfile,
        ctx: &EvaluationContext<'_>,
    ) -> Evaluation {
        let signals = self.engine.run(tx, profile, ctx);
        let aggregate_score = self.aggregator.composite_score(&signals);
        let status = self.aggregator.status_for(aggregate_score);

        if status == IngestStatus::Held {
            tracing::info!(
                transaction = %tx.transaction_id,
                score = aggregate_score,
                signals = signals.len(),
                "transaction held for review"
            );
        }

        Evaluation {
            signals,
            aggregate_score,
            status,
        }
    }
}
