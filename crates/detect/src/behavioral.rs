//! Behavioral-drift detector
//!
//! Compares a transaction against the member's own habits: when they
//! transact, how much, how fast, and with what transaction types. Five
//! independent checks, single most severe signal returned.

use chrono::Duration;
use finwatch_core::{most_severe, DetectionConfig, Severity, Signal, SignalKind, Transaction};
use finwatch_profile::MemberProfile;

use crate::context::EvaluationContext;
use crate::Detector;

pub const RULE_DOW_RARITY: &str = "DOW_RARITY";
pub const RULE_AMOUNT_RANGE: &str = "AMOUNT_RANGE_DRIFT";
pub const RULE_BALANCE_DEPLETION: &str = "BALANCE_DEPLETION";
pub const RULE_VELOCITY: &str = "VELOCITY_SPIKE";
pub const RULE_RARE_TYPE: &str = "RARE_TX_TYPE";

/// Drift from the member's own historical behavior
pub struct BehavioralDriftDetector {
    min_history: usize,
}

impl BehavioralDriftDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            min_history: config.min_history_behavioral,
        }
    }

    /// Check 1: member rarely transacts on this day of week
    fn check_weekday_rarity(
        &self,
        tx: &Transaction,
        ctx: &EvaluationContext<'_>,
    ) -> Option<Signal> {
        let weekday = tx.weekday();
        let same_day = ctx
            .recent
            .iter()
            .filter(|t| t.weekday() == weekday)
            .count();
        let fraction = same_day as f64 / ctx.recent.len() as f64;
        if fraction >= 0.1 {
            return None;
        }

        Some(
            Signal::new(
                SignalKind::Behavioral,
                Severity::Medium,
                0.6,
                format!(
                    "Member rarely transacts on {:?} ({} of {} historical transactions)",
                    weekday,
                    same_day,
                    ctx.recent.len()
                ),
            )
            .with_rule(RULE_DOW_RARITY),
        )
    }

    /// Check 2: amount outside the member's typical 10th-90th percentile range
    fn check_amount_range(&self, tx: &Transaction, ctx: &EvaluationContext<'_>) -> Option<Signal> {
        let mut amounts: Vec<f64> = ctx.recent.iter().map(|t| t.amount_f64()).collect();
        amounts.sort_by(|a, b| a.total_cmp(b));

        let p10 = nearest_rank(&amounts, 0.1);
        let p90 = nearest_rank(&amounts, 0.9);
        let amount = tx.amount_f64();

        if amount > 2.0 * p90 {
            return Some(
                Signal::new(
                    SignalKind::Behavioral,
                    Severity::High,
                    0.75,
                    format!(
                        "Amount {} is more than double the member's 90th percentile {:.2}",
                        tx.amount, p90
                    ),
                )
                .with_rule(RULE_AMOUNT_RANGE),
            );
        }

        if amount < p10 || amount > p90 {
            return Some(
                Signal::new(
                    SignalKind::Behavioral,
                    Severity::Medium,
                    0.6,
                    format!(
                        "Amount {} outside typical range {:.2}-{:.2}",
                        tx.amount, p10, p90
                    ),
                )
                .with_rule(RULE_AMOUNT_RANGE),
            );
        }

        None
    }

    /// Check 3: resulting balance far below the member's historical average
    fn check_balance_depletion(
        &self,
        tx: &Transaction,
        ctx: &EvaluationContext<'_>,
    ) -> Option<Signal> {
        let average = ctx.recent.iter().map(|t| t.balance_f64()).sum::<f64>()
            / ctx.recent.len() as f64;
        if average <= 0.0 {
            return None;
        }
        if tx.balance_f64() >= average * 0.25 {
            return None;
        }

        Some(
            Signal::new(
                SignalKind::Behavioral,
                Severity::High,
                0.7,
                format!(
                    "Balance {} dropped below a quarter of the historical average {:.2}",
                    tx.account_balance, average
                ),
            )
            .with_rule(RULE_BALANCE_DEPLETION),
        )
    }

    /// Check 4: trailing-24h transaction velocity against the member's baseline
    fn check_velocity(&self, tx: &Transaction, ctx: &EvaluationContext<'_>) -> Option<Signal> {
        let first = ctx.recent.first()?;
        let span_days = (tx.timestamp - first.timestamp).num_days().max(1) as f64;
        let baseline = ctx.recent.len() as f64 / span_days;
        if baseline <= 0.0 {
            return None;
        }

        let window_start = tx.timestamp - Duration::hours(24);
        let in_window = ctx
            .recent
            .iter()
            .filter(|t| t.timestamp > window_start && t.timestamp <= tx.timestamp)
            .count()
            + 1;

        let ratio = in_window as f64 / baseline;
        let severity = if ratio >= 3.0 {
            Severity::High
        } else if ratio >= 2.0 {
            Severity::Medium
        } else {
            return None;
        };

        let confidence = if severity == Severity::High { 0.7 } else { 0.6 };
        Some(
            Signal::new(
                SignalKind::Behavioral,
                severity,
                confidence,
                format!(
                    "{} transactions in 24h against a baseline of {:.1} per day",
                    in_window, baseline
                ),
            )
            .with_rule(RULE_VELOCITY),
        )
    }

    /// Check 5: transaction type the member rarely or never uses
    fn check_rare_type(&self, tx: &Transaction, ctx: &EvaluationContext<'_>) -> Option<Signal> {
        let same_type = ctx
            .recent
            .iter()
            .filter(|t| t.transaction_type == tx.transaction_type)
            .count();

        if same_type == 0 {
            return Some(
                Signal::new(
                    SignalKind::Behavioral,
                    Severity::Medium,
                    0.6,
                    format!(
                        "First {} for a member with {} historical transactions",
                        tx.transaction_type,
                        ctx.recent.len()
                    ),
                )
                .with_rule(RULE_RARE_TYPE),
            );
        }

        let fraction = same_type as f64 / ctx.recent.len() as f64;
        if fraction < 0.1 {
            return Some(
                Signal::new(
                    SignalKind::Behavioral,
                    Severity::Low,
                    0.5,
                    format!(
                        "{} makes up {:.0}% of the member's history",
                        tx.transaction_type,
                        fraction * 100.0
                    ),
                )
                .with_rule(RULE_RARE_TYPE),
            );
        }

        None
    }
}

/// Nearest-rank percentile over a sorted slice
fn nearest_rank(sorted: &[f64], fraction: f64) -> f64 {
    let n = sorted.len();
    let idx = ((fraction * (n - 1) as f64).round() as usize).min(n - 1);
    sorted[idx]
}

impl Detector for BehavioralDriftDetector {
    fn name(&self) -> &str {
        "behavioral_drift"
    }

    fn detect(
        &self,
        tx: &Transaction,
        _profile: &MemberProfile,
        ctx: &EvaluationContext<'_>,
    ) -> Option<Signal> {
        if ctx.recent.len() < self.min_history {
            return None;
        }

        let fired: Vec<Signal> = [
            self.check_weekday_rarity(tx, ctx),
            self.check_amount_range(tx, ctx),
            self.check_balance_depletion(tx, ctx),
            self.check_velocity(tx, ctx),
            self.check_rare_type(tx, ctx),
        ]
        .into_iter()
        .flatten()
        .collect();

        most_severe(&fired).cloned()
    }
}
