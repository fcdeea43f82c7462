//! Member profile with incremental statistics
//!
//! Mean and variance are maintained with Welford's algorithm so a profile
//! can be updated from a single new observation without replaying history.

use finwatch_core::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Rolling statistics for one account holder.
///
/// `m2` is the running sum of squared deviations; stddev is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub member_id: String,
    pub mean_amount: f64,
    pub m2: f64,
    pub transaction_count: u64,
    /// Hours of day (0-23) this member has transacted at
    pub typical_hours: BTreeSet<u32>,
    /// Longitudinal risk score in [0, 1], recomputed from alert density
    pub risk_score: f64,
}

impl MemberProfile {
    /// Fresh profile with no observations
    pub fn new(member_id: impl Into<String>) -> Self {
        Self {
            member_id: member_id.into(),
            mean_amount: 0.0,
            m2: 0.0,
            transaction_count: 0,
            typical_hours: BTreeSet::new(),
            risk_score: 0.0,
        }
    }

    /// Population standard deviation of observed amounts
    pub fn stddev_amount(&self) -> f64 {
        if self.transaction_count < 2 {
            return 0.0;
        }
        (self.m2 / self.transaction_count as f64).sqrt()
    }

    /// z-score of an amount against this profile.
    ///
    /// Returns `None` when the profile has too little history for a
    /// meaningful deviation (fewer than two observations or zero variance).
    pub fn zscore(&self, amount: f64) -> Option<f64> {
        let stddev = self.stddev_amount();
        if self.transaction_count < 2 || stddev == 0.0 {
            return None;
        }
        Some((amount - self.mean_amount) / stddev)
    }

    /// Whether the member has ever transacted at this hour
    pub fn is_typical_hour(&self, hour: u32) -> bool {
        self.typical_hours.contains(&hour)
    }

    /// Fold one transaction into the running statistics (Welford update).
    pub fn observe(&mut self, tx: &Transaction) {
        let amount = tx.amount_f64();
        self.transaction_count += 1;
        let delta = amount - self.mean_amount;
        self.mean_amount += delta / self.transaction_count as f64;
        let delta2 = amount - self.mean_amount;
        self.m2 += delta * delta2;
        self.typical_hours.insert(tx.hour());
    }

    /// Set the longitudinal risk score, clamped into [0, 1]
    pub fn set_risk_score(&mut self, score: f64) {
        self.risk_score = score.clamp(0.0, 1.0);
    }
}
