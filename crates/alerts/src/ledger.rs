//! SQLite storage for alerts
//!
//! Borrows its connection so alert writes can share the ingestion
//! transaction with the profile update and the audit append.

use crate::alert::Alert;
use chrono::DateTime;
use finwatch_core::{Severity, SignalKind};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

/// Errors from the alert ledger
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Alert not found: {0}")]
    NotFound(String),

    #[error("Stored alert {id} has a malformed field: {field}")]
    Malformed { id: String, field: &'static str },
}

/// Per-member alert statistics feeding the longitudinal risk score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberAlertStats {
    pub total: u64,
    pub critical: u64,
    pub high: u64,
    pub unreviewed: u64,
}

/// Repository over the `alerts` table
pub struct AlertLedger<'c> {
    conn: &'c Connection,
}

impl<'c> AlertLedger<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Create the schema if it does not exist
    pub fn init(&self) -> Result<(), AlertError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                member_id TEXT NOT NULL,
                transaction_id TEXT NOT NULL,
                reason TEXT NOT NULL,
                confidence REAL NOT NULL,
                severity TEXT NOT NULL,
                created_at TEXT NOT NULL,
                reviewed INTEGER NOT NULL DEFAULT 0,
                rule_type TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_alerts_member ON alerts(member_id)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_alerts_reviewed ON alerts(reviewed)",
            [],
        )?;

        Ok(())
    }

    /// Persist a new alert
    pub fn insert(&self, alert: &Alert) -> Result<(), AlertError> {
        self.conn.execute(
            "INSERT INTO alerts
             (id, kind, member_id, transaction_id, reason, confidence, severity,
              created_at, reviewed, rule_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                alert.id,
                alert.kind.to_string(),
                alert.member_id,
                alert.transaction_id,
                alert.reason,
                alert.confidence,
                alert.severity.to_string(),
                alert.created_at.to_rfc3339(),
                alert.reviewed as i64,
                alert.rule_type,
            ],
        )?;
        Ok(())
    }

    /// Fetch an alert by id
    pub fn get(&self, id: &str) -> Result<Alert, AlertError> {
        let alert = self
            .conn
            .query_row(
                "SELECT id, kind, member_id, transaction_id, reason, confidence,
                        severity, created_at, reviewed, rule_type
                 FROM alerts WHERE id = ?1",
                params![id],
                row_to_alert,
            )
            .optional()?
            .ok_or_else(|| AlertError::NotFound(id.to_string()))??;
        Ok(alert)
    }

    /// Transition an alert to reviewed.
    ///
    /// Idempotent: the first call flips the flag, repeats change nothing.
    /// Returns the stored alert and whether this call changed it.
    pub fn mark_reviewed(&self, id: &str) -> Result<(Alert, bool), AlertError> {
        let changed = self.conn.execute(
            "UPDATE alerts SET reviewed = 1 WHERE id = ?1 AND reviewed = 0",
            params![id],
        )?;

        let alert = self.get(id)?;
        Ok((alert, changed > 0))
    }

    /// All unreviewed alerts, oldest first
    pub fn list_unreviewed(&self) -> Result<Vec<Alert>, AlertError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, member_id, transaction_id, reason, confidence,
                    severity, created_at, reviewed, rule_type
             FROM alerts WHERE reviewed = 0 ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map([], row_to_alert)?;
        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row??);
        }
        Ok(alerts)
    }

    /// Alerts for one member, newest first
    pub fn list_for_member(&self, member_id: &str) -> Result<Vec<Alert>, AlertError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, member_id, transaction_id, reason, confidence,
                    severity, created_at, reviewed, rule_type
             FROM alerts WHERE member_id = ?1 ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(params![member_id], row_to_alert)?;
        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row??);
        }
        Ok(alerts)
    }

    /// Aggregate counts feeding the longitudinal risk blend
    pub fn member_stats(&self, member_id: &str) -> Result<MemberAlertStats, AlertError> {
        let stats = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(severity = 'critical'), 0),
                    COALESCE(SUM(severity = 'high'), 0),
                    COALESCE(SUM(reviewed = 0), 0)
             FROM alerts WHERE member_id = ?1",
            params![member_id],
            |row| {
                Ok(MemberAlertStats {
                    total: row.get::<_, i64>(0)? as u64,
                    critical: row.get::<_, i64>(1)? as u64,
                    high: row.get::<_, i64>(2)? as u64,
                    unreviewed: row.get::<_, i64>(3)? as u64,
                })
            },
        )?;
        Ok(stats)
    }
}

/// Map a row to an Alert, deferring enum parse errors
fn row_to_alert(row: &Row<'_>) -> rusqlite::Result<Result<Alert, AlertError>> {
    let id: String = row.get(0)?;
    let kind_str: String = row.get(1)?;
    let severity_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;

    let kind: Result<SignalKind, _> = kind_str.parse();
    let severity: Result<Severity, _> = severity_str.parse();
    let created_at = DateTime::parse_from_rfc3339(&created_at_str);

    let (Ok(kind), Ok(severity), Ok(created_at)) = (kind, severity, created_at) else {
        return Ok(Err(AlertError::Malformed {
            id,
            field: "kind/severity/created_at",
        }));
    };

    Ok(Ok(Alert {
        id,
        kind,
        member_id: row.get(2)?,
        transaction_id: row.get(3)?,
        reason: row.get(4)?,
        confidence: row.get(5)?,
        severity,
        created_at: created_at.with_timezone(&chrono::Utc),
        reviewed: row.get::<_, i64>(8)? != 0,
        rule_type: row.get(9)?,
    }))
}
