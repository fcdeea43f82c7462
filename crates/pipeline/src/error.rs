//! Pipeline error taxonomy
//!
//! Callers branch on these variants to render specific messages; `code()`
//! gives a stable machine-readable tag per variant.

use finwatch_alerts::AlertError;
use finwatch_audit::AuditError;
use finwatch_core::{Role, ValidationError};
use finwatch_profile::ProfileError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors surfaced by pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Role {role} lacks approval authority")]
    PermissionDenied { role: Role },

    #[error("Actor {actor_id} created transaction {transaction_id} and cannot decide it")]
    SegregationViolation {
        actor_id: String,
        transaction_id: String,
    },

    #[error("Transaction {0} has no creation record on the audit chain")]
    UnknownTransaction(String),

    #[error("Transaction {0} was already ingested")]
    DuplicateTransaction(String),

    #[error("Stored transaction {id} has a malformed field: {field}")]
    MalformedRecord { id: String, field: &'static str },

    #[error("Store unavailable after {attempts} attempts: {message}")]
    StoreUnavailable { attempts: u32, message: String },

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Alert(#[from] AlertError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl PipelineError {
    /// Stable code for caller-side rendering
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "VALIDATION_FAILED",
            PipelineError::PermissionDenied { .. } => "PERMISSION_DENIED",
            PipelineError::SegregationViolation { .. } => "SEGREGATION_VIOLATION",
            PipelineError::UnknownTransaction(_) => "UNKNOWN_TRANSACTION",
            PipelineError::DuplicateTransaction(_) => "DUPLICATE_TRANSACTION",
            PipelineError::MalformedRecord { .. } => "MALFORMED_RECORD",
            PipelineError::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            PipelineError::Audit(_) => "AUDIT_CHAIN",
            PipelineError::Alert(_) => "ALERT_LEDGER",
            PipelineError::Profile(_) => "PROFILE_STORE",
            PipelineError::Database(_) => "DATABASE",
        }
    }

    /// Whether a retry with backoff might succeed
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            PipelineError::Database(e) => transient_sqlite(e),
            PipelineError::Audit(AuditError::Database(e)) => transient_sqlite(e),
            PipelineError::Audit(AuditError::Conflict { .. }) => true,
            PipelineError::Alert(AlertError::Database(e)) => transient_sqlite(e),
            PipelineError::Profile(ProfileError::Database(e)) => transient_sqlite(e),
            _ => false,
        }
    }
}

fn transient_sqlite(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinguishable() {
        let segregation = PipelineError::SegregationViolation {
            actor_id: "u-1".into(),
            transaction_id: "TX-1".into(),
        };
        let permission = PipelineError::PermissionDenied { role: Role::Teller };

        assert_eq!(segregation.code(), "SEGREGATION_VIOLATION");
        assert_eq!(permission.code(), "PERMISSION_DENIED");
        assert_ne!(segregation.code(), permission.code());
    }

    #[test]
    fn test_chain_conflict_is_transient() {
        let err = PipelineError::Audit(AuditError::Conflict {
            prev_hash: "abc".into(),
        });
        assert!(err.is_transient());
    }

    #[test]
    fn test_validation_is_not_transient() {
        let err = PipelineError::Validation(ValidationError::EmptyMemberId);
        assert!(!err.is_transient());
    }
}
