//! Rule-based detector
//!
//! Five independent checks evaluated in declared priority order; only the
//! single most severe signal is returned, earlier checks winning ties.

use chrono::Duration;
use finwatch_core::{
    most_severe, DetectionConfig, Severity, Signal, SignalKind, TierConfidence, Transaction,
};
use finwatch_profile::MemberProfile;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::context::EvaluationContext;
use crate::Detector;

pub const RULE_AMOUNT_ZSCORE: &str = "AMOUNT_ZSCORE";
pub const RULE_OFF_HOURS: &str = "OFF_HOURS";
pub const RULE_RAPID_WITHDRAWALS: &str = "RAPID_WITHDRAWALS";
pub const RULE_NEGATIVE_BALANCE: &str = "NEGATIVE_BALANCE";
pub const RULE_LAYERING: &str = "DEPOSIT_WITHDRAW_LAYERING";

/// Explicit rule checks against a member's profile and recent activity
pub struct RuleBasedDetector {
    zscore_threshold: f64,
    business_open_hour: u32,
    business_close_hour: u32,
    early_morning_end: u32,
    late_night_start: u32,
    rapid_withdrawal_count: usize,
    rapid_withdrawal_window: Duration,
    large_tx_threshold: Decimal,
    layering_withdrawal_fraction: f64,
    layering_deposit_fraction: f64,
    layering_window: Duration,
    confidence: TierConfidence,
}

impl RuleBasedDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            zscore_threshold: config.zscore_threshold,
            business_open_hour: config.business_open_hour,
            business_close_hour: config.business_close_hour,
            early_morning_end: config.early_morning_end,
            late_night_start: config.late_night_start,
            rapid_withdrawal_count: config.rapid_withdrawal_count,
            rapid_withdrawal_window: Duration::minutes(config.rapid_withdrawal_window_minutes),
            large_tx_threshold: config.large_tx_threshold,
            layering_withdrawal_fraction: config.layering_withdrawal_fraction,
            layering_deposit_fraction: config.layering_deposit_fraction,
            layering_window: Duration::hours(config.layering_window_hours),
            confidence: config.tier_confidence,
        }
    }

    fn signal(&self, severity: Severity, reason: String, rule_id: &str) -> Signal {
        Signal::new(
            SignalKind::Rule,
            severity,
            self.confidence.for_severity(severity),
            reason,
        )
        .with_rule(rule_id)
    }

    /// Rule 1: amount deviates from the member's own profile
    fn check_amount_zscore(&self, tx: &Transaction, profile: &MemberProfile) -> Option<Signal> {
        let z = profile.zscore(tx.amount_f64())?;
        let magnitude = z.abs();
        if magnitude <= self.zscore_threshold {
            return None;
        }

        let severity = if magnitude > 4.0 {
            Severity::Critical
        } else if magnitude > 3.0 {
            Severity::High
        } else {
            Severity::Medium
        };

        Some(self.signal(
            severity,
            format!(
                "Amount {} deviates {:.1} sigma from member mean {:.2}",
                tx.amount, magnitude, profile.mean_amount
            ),
            RULE_AMOUNT_ZSCORE,
        ))
    }

    /// Rule 2: transaction outside business hours
    fn check_off_hours(&self, tx: &Transaction) -> Option<Signal> {
        let hour = tx.hour();
        if hour >= self.business_open_hour && hour < self.business_close_hour {
            return None;
        }

        let severity = if hour < self.early_morning_end || hour >= self.late_night_start {
            Severity::High
        } else {
            Severity::Medium
        };

        Some(self.signal(
            severity,
            format!(
                "Transaction at {:02}:00 outside business hours {:02}:00-{:02}:00",
                hour, self.business_open_hour, self.business_close_hour
            ),
            RULE_OFF_HOURS,
        ))
    }

    /// Rule 3: several withdrawals within the trailing window
    fn check_rapid_withdrawals(
        &self,
        tx: &Transaction,
        ctx: &EvaluationContext<'_>,
    ) -> Option<Signal> {
        if !tx.is_withdrawal() {
            return None;
        }

        let window_start = tx.timestamp - self.rapid_withdrawal_window;
        let prior = ctx
            .recent
            .iter()
            .filter(|t| t.is_withdrawal())
            .filter(|t| t.timestamp >= window_start && t.timestamp <= tx.timestamp)
            .count();

        // The incoming withdrawal counts too
        let count = prior + 1;
        if count < self.rapid_withdrawal_count {
            return None;
        }

        Some(self.signal(
            Severity::High,
            format!(
                "{} withdrawals within {} minutes",
                count,
                self.rapid_withdrawal_window.num_minutes()
            ),
            RULE_RAPID_WITHDRAWALS,
        ))
    }

    /// Rule 4: resulting balance is negative
    fn check_negative_balance(&self, tx: &Transaction) -> Option<Signal> {
        if tx.account_balance >= Decimal::ZERO {
            return None;
        }

        Some(self.signal(
            Severity::Critical,
            format!("Resulting balance {} is negative", tx.account_balance),
            RULE_NEGATIVE_BALANCE,
        ))
    }

    /// Rule 5: deposit-then-withdraw layering pattern
    fn check_layering(&self, tx: &Transaction, ctx: &EvaluationContext<'_>) -> Option<Signal> {
        if !tx.is_withdrawal() {
            return None;
        }

        let large = self.large_tx_threshold.to_f64().unwrap_or(f64::MAX);
        let min_deposit = large * self.layering_deposit_fraction;
        let window_start = tx.timestamp - self.layering_window;
        let withdrawal = tx.amount_f64();

        let matched = ctx
            .recent
            .iter()
            .filter(|t| t.is_deposit())
            .filter(|t| t.timestamp >= window_start && t.timestamp <= tx.timestamp)
            .find(|t| {
                let deposit = t.amount_f64();
                deposit >= min_deposit && withdrawal >= deposit * self.layering_withdrawal_fraction
            })?;

        Some(self.signal(
            Severity::Critical,
            format!(
                "Withdrawal of {} follows deposit of {} within {} hours",
                tx.amount,
                matched.amount,
                self.layering_window.num_hours()
            ),
            RULE_LAYERING,
        ))
    }
}

impl Detector for RuleBasedDetector {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn detect(
        &self,
        tx: &Transaction,
        profile: &MemberProfile,
        ctx: &EvaluationContext<'_>,
    ) -> Option<Signal> {
        // Declared order is the tie-break order
        let fired: Vec<Signal> = [
            self.check_amount_zscore(tx, profile),
            self.check_off_hours(tx),
            self.check_rapid_withdrawals(tx, ctx),
            self.check_negative_balance(tx),
            self.check_layering(tx, ctx),
        ]
        .into_iter()
        .flatten()
        .collect();

        most_severe(&fired).cloned()
    }
}
