//! FinWatch approval rules
//!
//! The segregation-of-duties gate: before an approval or rejection is
//! persisted, the acting reviewer is checked against the transaction's
//! recorded creator. The check is pure; the pipeline supplies the creator
//! from the audit chain and records the outcome.
//!
//! Ordering matters: roles without approval authority are rejected BEFORE
//! the segregation check and never reach the chain.

use finwatch_core::Actor;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Outcome of the pre-approval gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalCheck {
    /// The reviewer may decide this transaction
    Allow,
    /// The reviewer created the transaction - hard failure, logged
    SegregationViolation,
    /// The reviewer's role has no approval authority - rejected early
    InsufficientPermissions,
}

impl ApprovalCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ApprovalCheck::Allow)
    }
}

/// The reviewer's decision once the gate allows them through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    /// The audit action verb this decision records
    pub fn action_verb(&self) -> &'static str {
        match self {
            ReviewDecision::Approve => "approved",
            ReviewDecision::Reject => "rejected",
        }
    }
}

/// Evaluate the gate for a reviewer acting on a transaction.
///
/// `created_by` is the actor id the audit chain recorded for the
/// transaction's creation.
pub fn can_approve(created_by: &str, actor: &Actor) -> ApprovalCheck {
    if !actor.role.can_approve() {
        return ApprovalCheck::InsufficientPermissions;
    }
    if actor.id == created_by {
        return ApprovalCheck::SegregationViolation;
    }
    ApprovalCheck::Allow
}
