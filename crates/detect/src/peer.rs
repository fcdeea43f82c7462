//! Peer-comparison detector
//!
//! Compares the member's longitudinal risk score against members with a
//! similar average transaction amount. Abstains when the peer group is too
//! small to be meaningful.

use finwatch_core::{DetectionConfig, Severity, Signal, SignalKind, Transaction};
use finwatch_profile::MemberProfile;

use crate::context::EvaluationContext;
use crate::Detector;

pub const RULE_PEER_RISK: &str = "PEER_RISK_EXCESS";

/// Longitudinal risk relative to similar members
pub struct PeerComparisonDetector {
    min_peer_group: usize,
    similarity_fraction: f64,
    risk_multiplier: f64,
    risk_floor: f64,
}

impl PeerComparisonDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            min_peer_group: config.min_peer_group,
            similarity_fraction: config.peer_similarity_fraction,
            risk_multiplier: config.peer_risk_multiplier,
            risk_floor: config.peer_risk_floor,
        }
    }

    /// Members whose mean amount is within the similarity band of the subject
    fn peer_group<'a>(
        &self,
        profile: &MemberProfile,
        ctx: &EvaluationContext<'a>,
    ) -> Vec<&'a MemberProfile> {
        let band = profile.mean_amount.abs() * self.similarity_fraction;
        ctx.profiles
            .iter()
            .filter(|p| p.member_id != profile.member_id)
            .filter(|p| (p.mean_amount - profile.mean_amount).abs() <= band)
            .collect()
    }
}

impl Detector for PeerComparisonDetector {
    fn name(&self) -> &str {
        "peer_comparison"
    }

    fn detect(
        &self,
        _tx: &Transaction,
        profile: &MemberProfile,
        ctx: &EvaluationContext<'_>,
    ) -> Option<Signal> {
        let peers = self.peer_group(profile, ctx);
        if peers.len() < self.min_peer_group {
            return None;
        }

        let peer_average =
            peers.iter().map(|p| p.risk_score).sum::<f64>() / peers.len() as f64;

        let risk = profile.risk_score;
        if risk <= self.risk_floor || risk <= peer_average * self.risk_multiplier {
            return None;
        }

        // A risk score triple the peer average is a stronger indicator
        let severity = if peer_average > 0.0 && risk > peer_average * 3.0 {
            Severity::High
        } else {
            Severity::Medium
        };

        Some(
            Signal::new(
                SignalKind::Peer,
                severity,
                0.65,
                format!(
                    "Risk score {:.2} exceeds {:.1}x the average {:.2} of {} similar members",
                    risk,
                    self.risk_multiplier,
                    peer_average,
                    peers.len()
                ),
            )
            .with_rule(RULE_PEER_RISK),
        )
    }
}
