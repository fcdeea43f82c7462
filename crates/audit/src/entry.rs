//! Audit log entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel `prev_hash` of the first entry: 64 zero characters
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Action verbs recorded on the chain
pub mod action {
    pub const CREATED: &str = "created";
    pub const APPROVED: &str = "approved";
    pub const REJECTED: &str = "rejected";
    /// An approval attempt blocked by the segregation-of-duties gate.
    /// Distinct from a normal rejection.
    pub const SEGREGATION_VIOLATION: &str = "segregation_violation";
    pub const ALERT_REVIEWED: &str = "alert_reviewed";
}

/// One write-once entry on the audit chain.
///
/// `id` is assigned by the store and strictly increasing; `hash` covers the
/// canonical content plus `prev_hash`, linking the entry to its predecessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub actor_id: String,
    pub actor_role: String,
    pub payload: Value,
    pub prev_hash: String,
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

/// The caller-supplied part of a new entry
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub actor_id: String,
    pub actor_role: String,
    pub payload: Value,
}

impl AppendRequest {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        action: impl Into<String>,
        actor_id: impl Into<String>,
        actor_role: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            action: action.into(),
            actor_id: actor_id.into(),
            actor_role: actor_role.into(),
            payload,
        }
    }
}
