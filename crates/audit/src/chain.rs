//! Chain storage: append, verify, query
//!
//! Append reads the tail digest and inserts the new entry against it.
//! Callers serialize appends (one writer); the UNIQUE constraint on
//! `prev_hash` rejects a forked append outright.

use crate::entry::{AppendRequest, AuditLogEntry, GENESIS_HASH};
use crate::hash::entry_digest;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use thiserror::Error;

/// Errors from the audit chain
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Concurrent append lost the race for prev_hash {prev_hash}")]
    Conflict { prev_hash: String },

    #[error("Stored entry {id} has a malformed field: {field}")]
    Malformed { id: i64, field: &'static str },

    #[error("Chain integrity violated at entry {first_divergence_id}")]
    Integrity { first_divergence_id: i64 },
}

/// Result of a full-chain verification scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainReport {
    pub valid: bool,
    pub total_entries: u64,
    /// Id of the first entry whose stored linkage or digest diverges
    pub first_divergence_id: Option<i64>,
}

impl ChainReport {
    /// Convert an invalid report into a typed error
    pub fn ensure_valid(&self) -> Result<(), AuditError> {
        match self.first_divergence_id {
            None => Ok(()),
            Some(id) => Err(AuditError::Integrity {
                first_divergence_id: id,
            }),
        }
    }
}

/// Repository over the `audit_log` table
pub struct AuditChain<'c> {
    conn: &'c Connection,
}

impl<'c> AuditChain<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Create the schema if it does not exist
    pub fn init(&self) -> Result<(), AuditError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                action TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                actor_role TEXT NOT NULL,
                payload TEXT NOT NULL,
                prev_hash TEXT NOT NULL UNIQUE,
                hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_audit_entity
             ON audit_log(entity_type, entity_id)",
            [],
        )?;

        Ok(())
    }

    /// Digest of the current tail entry, or the genesis sentinel
    pub fn tail_hash(&self) -> Result<String, AuditError> {
        let hash = self
            .conn
            .query_row(
                "SELECT hash FROM audit_log ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(hash.unwrap_or_else(|| GENESIS_HASH.to_string()))
    }

    /// Append a new entry linked to the current tail.
    ///
    /// Fails closed: if the tail cannot be established or the insert is
    /// rejected, nothing is written. A lost race against another writer
    /// surfaces as [`AuditError::Conflict`] for the caller to retry.
    pub fn append(&self, request: AppendRequest) -> Result<AuditLogEntry, AuditError> {
        let prev_hash = self.tail_hash()?;
        let hash = entry_digest(
            &request.entity_type,
            &request.entity_id,
            &request.action,
            &request.actor_id,
            &request.actor_role,
            &request.payload,
            &prev_hash,
        );
        let created_at = Utc::now();
        let payload_json = serde_json::to_string(&request.payload)?;

        let inserted = self.conn.execute(
            "INSERT INTO audit_log
             (entity_type, entity_id, action, actor_id, actor_role, payload,
              prev_hash, hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                request.entity_type,
                request.entity_id,
                request.action,
                request.actor_id,
                request.actor_role,
                payload_json,
                prev_hash,
                hash,
                created_at.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                tracing::warn!(prev_hash = %prev_hash, "audit append lost a race");
                return Err(AuditError::Conflict { prev_hash });
            }
            Err(e) => return Err(e.into()),
        }

        let id = self.conn.last_insert_rowid();
        tracing::info!(id, action = %request.action, entity = %request.entity_id, "audit entry appended");

        Ok(AuditLogEntry {
            id,
            entity_type: request.entity_type,
            entity_id: request.entity_id,
            action: request.action,
            actor_id: request.actor_id,
            actor_role: request.actor_role,
            payload: request.payload,
            prev_hash,
            hash,
            created_at,
        })
    }

    /// Replay the whole chain and report the first divergence, if any.
    ///
    /// An entry diverges when its stored `prev_hash` does not match the
    /// previous entry's stored `hash`, or when its stored `hash` no longer
    /// matches a digest recomputed from its stored content.
    pub fn verify(&self) -> Result<ChainReport, AuditError> {
        let entries = self.all()?;
        let mut expected_prev = GENESIS_HASH.to_string();

        for entry in &entries {
            if entry.prev_hash != expected_prev {
                return Ok(ChainReport {
                    valid: false,
                    total_entries: entries.len() as u64,
                    first_divergence_id: Some(entry.id),
                });
            }

            let recomputed = entry_digest(
                &entry.entity_type,
                &entry.entity_id,
                &entry.action,
                &entry.actor_id,
                &entry.actor_role,
                &entry.payload,
                &entry.prev_hash,
            );
            if recomputed != entry.hash {
                return Ok(ChainReport {
                    valid: false,
                    total_entries: entries.len() as u64,
                    first_divergence_id: Some(entry.id),
                });
            }

            expected_prev = entry.hash.clone();
        }

        Ok(ChainReport {
            valid: true,
            total_entries: entries.len() as u64,
            first_divergence_id: None,
        })
    }

    /// All entries in ascending id order
    pub fn all(&self) -> Result<Vec<AuditLogEntry>, AuditError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_type, entity_id, action, actor_id, actor_role,
                    payload, prev_hash, hash, created_at
             FROM audit_log ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row??);
        }
        Ok(entries)
    }

    /// Number of entries on the chain
    pub fn len(&self) -> Result<u64, AuditError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool, AuditError> {
        Ok(self.len()? == 0)
    }

    /// The most recent entry, if any
    pub fn tail(&self) -> Result<Option<AuditLogEntry>, AuditError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, entity_type, entity_id, action, actor_id, actor_role,
                        payload, prev_hash, hash, created_at
                 FROM audit_log ORDER BY id DESC LIMIT 1",
                [],
                row_to_entry,
            )
            .optional()?;
        row.transpose()
    }

    /// Entries for one entity, ascending
    pub fn entries_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_type, entity_id, action, actor_id, actor_role,
                    payload, prev_hash, hash, created_at
             FROM audit_log
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![entity_type, entity_id], row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row??);
        }
        Ok(entries)
    }

    /// The actor recorded as having created an entity, if any.
    /// This is what the segregation-of-duties gate consults.
    pub fn creator_of(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Option<String>, AuditError> {
        let actor = self
            .conn
            .query_row(
                "SELECT actor_id FROM audit_log
                 WHERE entity_type = ?1 AND entity_id = ?2 AND action = ?3
                 ORDER BY id ASC LIMIT 1",
                params![entity_type, entity_id, crate::entry::action::CREATED],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(actor)
    }
}

/// Map a row to an entry, deferring parse errors
fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<Result<AuditLogEntry, AuditError>> {
    let id: i64 = row.get(0)?;
    let payload_json: String = row.get(6)?;
    let created_at_str: String = row.get(9)?;

    let payload = serde_json::from_str(&payload_json);
    let created_at = DateTime::parse_from_rfc3339(&created_at_str);

    let (Ok(payload), Ok(created_at)) = (payload, created_at) else {
        return Ok(Err(AuditError::Malformed {
            id,
            field: "payload/created_at",
        }));
    };

    Ok(Ok(AuditLogEntry {
        id,
        entity_type: row.get(1)?,
        entity_id: row.get(2)?,
        action: row.get(3)?,
        actor_id: row.get(4)?,
        actor_role: row.get(5)?,
        payload,
        prev_hash: row.get(7)?,
        hash: row.get(8)?,
        created_at: created_at.with_timezone(&Utc),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::action;
    use serde_json::json;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        AuditChain::new(&conn).init().unwrap();
        conn
    }

    fn request(entity_id: &str, verb: &str, actor: &str) -> AppendRequest {
        AppendRequest::new(
            "transaction",
            entity_id,
            verb,
            actor,
            "teller",
            json!({"entity": entity_id}),
        )
    }

    #[test]
    fn test_empty_chain_is_valid() {
        let conn = open();
        let chain = AuditChain::new(&conn);

        let report = chain.verify().unwrap();
        assert!(report.valid);
        assert_eq!(report.total_entries, 0);
        assert!(report.first_divergence_id.is_none());
    }

    #[test]
    fn test_first_entry_links_to_genesis() {
        let conn = open();
        let chain = AuditChain::new(&conn);

        let entry = chain.append(request("TX-1", action::CREATED, "u-1")).unwrap();
        assert_eq!(entry.prev_hash, GENESIS_HASH);
        assert_eq!(entry.id, 1);
    }

    #[test]
    fn test_sequential_appends_link_and_verify() {
        let conn = open();
        let chain = AuditChain::new(&conn);

        let a = chain.append(request("TX-A", action::CREATED, "u-1")).unwrap();
        let b = chain.append(request("TX-B", action::CREATED, "u-1")).unwrap();
        let c = chain.append(request("TX-C", action::CREATED, "u-1")).unwrap();

        assert_eq!(b.prev_hash, a.hash);
        assert_eq!(c.prev_hash, b.hash);

        let report = chain.verify().unwrap();
        assert!(report.valid);
        assert_eq!(report.total_entries, 3);
        report.ensure_valid().unwrap();
    }

    #[test]
    fn test_tampered_payload_is_detected_at_that_entry() {
        let conn = open();
        let chain = AuditChain::new(&conn);

        for i in 0..5 {
            chain
                .append(request(&format!("TX-{}", i), action::CREATED, "u-1"))
                .unwrap();
        }

        // Retroactively edit entry 3's payload behind the chain's back
        conn.execute(
            "UPDATE audit_log SET payload = ?1 WHERE id = 3",
            params![r#"{"entity":"TX-FORGED"}"#],
        )
        .unwrap();

        let report = chain.verify().unwrap();
        assert!(!report.valid);
        assert_eq!(report.total_entries, 5);
        assert_eq!(report.first_divergence_id, Some(3));
        assert!(matches!(
            report.ensure_valid(),
            Err(AuditError::Integrity {
                first_divergence_id: 3
            })
        ));
    }

    #[test]
    fn test_recomputed_hash_forgery_breaks_the_next_link() {
        let conn = open();
        let chain = AuditChain::new(&conn);

        for i in 0..4 {
            chain
                .append(request(&format!("TX-{}", i), action::CREATED, "u-1"))
                .unwrap();
        }

        // A smarter attacker also recomputes entry 2's hash over the forged
        // payload - the break then shows at entry 3's prev link
        let forged_payload = json!({"entity": "TX-FORGED"});
        let entry2 = chain.all().unwrap()[1].clone();
        let forged_hash = entry_digest(
            &entry2.entity_type,
            &entry2.entity_id,
            &entry2.action,
            &entry2.actor_id,
            &entry2.actor_role,
            &forged_payload,
            &entry2.prev_hash,
        );
        conn.execute(
            "UPDATE audit_log SET payload = ?1, hash = ?2 WHERE id = 2",
            params![forged_payload.to_string(), forged_hash],
        )
        .unwrap();

        let report = chain.verify().unwrap();
        assert!(!report.valid);
        assert_eq!(report.first_divergence_id, Some(3));
    }

    #[test]
    fn test_forked_append_is_a_conflict() {
        let conn = open();
        let chain = AuditChain::new(&conn);

        let a = chain.append(request("TX-A", action::CREATED, "u-1")).unwrap();

        // Simulate a racer inserting against the same stale tail
        let digest = entry_digest(
            "transaction",
            "TX-B",
            action::CREATED,
            "u-2",
            "teller",
            &json!({}),
            &a.prev_hash,
        );
        let result = conn.execute(
            "INSERT INTO audit_log
             (entity_type, entity_id, action, actor_id, actor_role, payload,
              prev_hash, hash, created_at)
             VALUES ('transaction', 'TX-B', 'created', 'u-2', 'teller', '{}',
                     ?1, ?2, '2024-03-15T11:00:00+00:00')",
            params![a.prev_hash, digest],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_entity_queries() {
        let conn = open();
        let chain = AuditChain::new(&conn);

        chain.append(request("TX-1", action::CREATED, "teller-1")).unwrap();
        chain.append(request("TX-2", action::CREATED, "teller-2")).unwrap();
        chain.append(request("TX-1", action::APPROVED, "manager-1")).unwrap();

        let entries = chain.entries_for_entity("transaction", "TX-1").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, action::CREATED);
        assert_eq!(entries[1].action, action::APPROVED);

        assert_eq!(
            chain.creator_of("transaction", "TX-1").unwrap().as_deref(),
            Some("teller-1")
        );
        assert_eq!(chain.creator_of("transaction", "TX-9").unwrap(), None);
    }

    #[test]
    fn test_tail_and_len() {
        let conn = open();
        let chain = AuditChain::new(&conn);

        assert!(chain.is_empty().unwrap());
        assert!(chain.tail().unwrap().is_none());

        chain.append(request("TX-1", action::CREATED, "u-1")).unwrap();
        let b = chain.append(request("TX-2", action::CREATED, "u-1")).unwrap();

        assert_eq!(chain.len().unwrap(), 2);
        assert_eq!(chain.tail().unwrap().unwrap().id, b.id);
        assert_eq!(chain.tail_hash().unwrap(), b.hash);
    }

    #[test]
    fn test_entry_round_trip_preserves_payload() {
        let conn = open();
        let chain = AuditChain::new(&conn);

        let payload = json!({"amount": "1500", "status": "held", "score": 82.5});
        let appended = chain
            .append(AppendRequest::new(
                "transaction",
                "TX-1",
                action::CREATED,
                "u-1",
                "teller",
                payload.clone(),
            ))
            .unwrap();

        let loaded = chain.all().unwrap().pop().unwrap();
        assert_eq!(loaded.payload, payload);
        assert_eq!(loaded.hash, appended.hash);
    }
}
