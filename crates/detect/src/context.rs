//! Evaluation context - the historical data detectors read
//!
//! Detectors are pure: everything they need beyond the transaction itself
//! arrives here. Nothing in the context is mutated during evaluation, so
//! independent transactions can be evaluated concurrently.

use finwatch_core::Transaction;
use finwatch_profile::MemberProfile;

/// System-wide activity summary for spike detection
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemActivity {
    /// Transactions across ALL members in the trailing 24 hours
    pub transactions_last_24h: u64,
    /// Average transactions per day over the trailing 30 days
    pub daily_average_30d: f64,
}

/// Read-only inputs for one transaction's evaluation
#[derive(Debug, Clone)]
pub struct EvaluationContext<'a> {
    /// The member's recent transactions, ascending by timestamp,
    /// NOT including the transaction under evaluation
    pub recent: &'a [Transaction],
    /// All member profiles (peer comparison input)
    pub profiles: &'a [MemberProfile],
    pub activity: SystemActivity,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        recent: &'a [Transaction],
        profiles: &'a [MemberProfile],
        activity: SystemActivity,
    ) -> Self {
        Self {
            recent,
            profiles,
            activity,
        }
    }
}
