//! Alert record

use chrono::{DateTime, Utc};
use finwatch_core::{Severity, Signal, SignalKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted, reviewable detector finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: SignalKind,
    pub member_id: String,
    pub transaction_id: String,
    pub reason: String,
    pub confidence: f64,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    pub reviewed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<String>,
}

impl Alert {
    /// Build an unreviewed alert from the fused signal of a transaction.
    ///
    /// `created_at` is supplied by the caller (the ingestion timestamp) so
    /// alert construction stays deterministic under test.
    pub fn from_signal(
        signal: &Signal,
        member_id: impl Into<String>,
        transaction_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("ALERT-{}", Uuid::new_v4()),
            kind: signal.kind,
            member_id: member_id.into(),
            transaction_id: transaction_id.into(),
            reason: signal.reason.clone(),
            confidence: signal.confidence,
            severity: signal.severity,
            created_at,
            reviewed: false,
            rule_type: signal.rule_id.clone(),
        }
    }
}
