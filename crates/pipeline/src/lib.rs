//! FinWatch pipeline - the orchestrator
//!
//! Ties the pure evaluation core to the durable stores:
//!
//! ```text
//! Transaction
//!      │ validate
//!      ▼
//! ┌──────────────┐   profile / history / activity
//! │  Evaluate    │◄──────────────────────────────── stores (read)
//! │  (pure)      │
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐   one SQL transaction:
//! │  Commit      │   transaction row + profile update
//! │              │   + alert (if fired) + audit "created" entry
//! └──────┬───────┘
//!        ▼
//!   Held | Passed
//! ```
//!
//! Later, a reviewer's approve/reject passes the segregation-of-duties gate
//! before anything is persisted; the outcome (or the attempted violation)
//! lands on the audit chain.
//!
//! Every write path runs under one `tokio::sync::Mutex<Connection>` - the
//! single-writer discipline that keeps hash-chain appends from forking -
//! and inside one SQL transaction, so an alert can never exist without its
//! audit entry or vice versa.

pub mod error;
pub mod evaluate;
pub mod history;
pub mod retry;

pub use error::PipelineError;
pub use evaluate::{Evaluation, Evaluator};
pub use finwatch_approval::ReviewDecision;
pub use finwatch_risk::IngestStatus;
pub use history::TransactionStore;
pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use rusqlite::Connection;
use serde_json::json;
use tokio::sync::Mutex;

use finwatch_alerts::{Alert, AlertLedger};
use finwatch_approval::{can_approve, ApprovalCheck};
use finwatch_audit::{action, AppendRequest, AuditChain, AuditLogEntry, ChainReport};
use finwatch_core::{Actor, DetectionConfig, Signal, Transaction};
use finwatch_detect::EvaluationContext;
use finwatch_profile::{MemberProfile, ProfileStore};

pub const ENTITY_TRANSACTION: &str = "transaction";
pub const ENTITY_ALERT: &str = "alert";

/// Member history window supplied to the detectors
const HISTORY_WINDOW_DAYS: i64 = 30;

/// Result of ingesting one transaction
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub transaction_id: String,
    pub status: IngestStatus,
    pub aggregate_score: f64,
    pub signals: Vec<Signal>,
    pub alert: Option<Alert>,
    pub audit_entry_id: i64,
}

/// Result of an approve/reject that passed the gate
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub transaction_id: String,
    pub decision: ReviewDecision,
    pub audit_entry_id: i64,
}

/// The monitoring pipeline over one shared store connection
pub struct Pipeline {
    conn: Arc<Mutex<Connection>>,
    evaluator: Evaluator,
    retry: RetryPolicy,
}

impl Pipeline {
    /// Build a pipeline over an open connection, creating schemas as needed
    pub fn new(conn: Connection, config: &DetectionConfig) -> Result<Self, PipelineError> {
        TransactionStore::new(&conn).init()?;
        ProfileStore::new(&conn).init()?;
        AlertLedger::new(&conn).init()?;
        AuditChain::new(&conn).init()?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            evaluator: Evaluator::new(config),
            retry: RetryPolicy::default(),
        })
    }

    /// In-memory pipeline (for testing)
    pub fn in_memory(config: &DetectionConfig) -> Result<Self, PipelineError> {
        Self::new(Connection::open_in_memory()?, config)
    }

    /// Pipeline over a database file
    pub fn open(
        path: impl AsRef<std::path::Path>,
        config: &DetectionConfig,
    ) -> Result<Self, PipelineError> {
        Self::new(Connection::open(path)?, config)
    }

    /// Override the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ingest one transaction: evaluate, persist, audit.
    ///
    /// The transaction row, profile update, alert (if any signal fired) and
    /// the "created" audit entry commit atomically - or none of them do.
    pub async fn ingest(
        &self,
        tx: Transaction,
        actor: &Actor,
    ) -> Result<IngestOutcome, PipelineError> {
        tx.validate()?;

        self.with_retries("ingest", |conn| {
            let db = conn.transaction()?;
            let outcome = {
                let store = TransactionStore::new(&db);
                let profiles = ProfileStore::new(&db);
                let alerts = AlertLedger::new(&db);
                let chain = AuditChain::new(&db);

                let profile = profiles.get_or_default(&tx.member_id)?;
                let recent = store.recent_for_member(
                    &tx.member_id,
                    tx.timestamp,
                    Duration::days(HISTORY_WINDOW_DAYS),
                )?;
                let all_profiles = profiles.all()?;
                let activity = store.system_activity(tx.timestamp)?;

                let ctx = EvaluationContext::new(&recent, &all_profiles, activity);
                let evaluation = self.evaluator.evaluate(&tx, &profile, &ctx);

                store.insert(&tx)?;

                let alert = match self.evaluator.aggregator().fuse(&evaluation.signals) {
                    Some(signal) => {
                        let alert = Alert::from_signal(
                            signal,
                            &tx.member_id,
                            &tx.transaction_id,
                            tx.timestamp,
                        );
                        alerts.insert(&alert)?;
                        Some(alert)
                    }
                    None => None,
                };

                let mut updated = profile;
                updated.observe(&tx);
                let stats = alerts.member_stats(&tx.member_id)?;
                let risk = self.evaluator.aggregator().longitudinal_score(
                    stats.total,
                    stats.critical,
                    stats.high,
                    stats.unreviewed,
                    updated.transaction_count,
                );
                updated.set_risk_score(risk);
                profiles.upsert(&updated)?;

                let payload = json!({
                    "member_id": tx.member_id,
                    "amount": tx.amount.to_string(),
                    "transaction_type": tx.transaction_type.to_string(),
                    "aggregate_score": evaluation.aggregate_score,
                    "status": evaluation.status.to_string(),
                    "alert_id": alert.as_ref().map(|a| a.id.clone()),
                });
                let entry = chain.append(AppendRequest::new(
                    ENTITY_TRANSACTION,
                    &tx.transaction_id,
                    action::CREATED,
                    &actor.id,
                    actor.role.to_string(),
                    payload,
                ))?;

                IngestOutcome {
                    transaction_id: tx.transaction_id.clone(),
                    status: evaluation.status,
                    aggregate_score: evaluation.aggregate_score,
                    signals: evaluation.signals,
                    alert,
                    audit_entry_id: entry.id,
                }
            };
            db.commit()?;
            Ok(outcome)
        })
        .await
    }

    /// Approve or reject a transaction through the segregation-of-duties gate.
    ///
    /// Roles without approval authority are rejected before anything touches
    /// the chain. A creator deciding their own transaction gets a distinct
    /// violation entry on the chain and a [`PipelineError::SegregationViolation`].
    pub async fn review(
        &self,
        transaction_id: &str,
        decision: ReviewDecision,
        actor: &Actor,
    ) -> Result<ReviewOutcome, PipelineError> {
        if !actor.role.can_approve() {
            tracing::warn!(
                actor = %actor.id,
                role = %actor.role,
                "review denied: no approval authority"
            );
            return Err(PipelineError::PermissionDenied { role: actor.role });
        }

        self.with_retries("review", |conn| {
            let db = conn.transaction()?;
            let result = {
                let chain = AuditChain::new(&db);
                let created_by = chain
                    .creator_of(ENTITY_TRANSACTION, transaction_id)?
                    .ok_or_else(|| {
                        PipelineError::UnknownTransaction(transaction_id.to_string())
                    })?;

                match can_approve(&created_by, actor) {
                    ApprovalCheck::Allow => {
                        let entry = chain.append(AppendRequest::new(
                            ENTITY_TRANSACTION,
                            transaction_id,
                            decision.action_verb(),
                            &actor.id,
                            actor.role.to_string(),
                            json!({
                                "decision": decision.to_string(),
                                "created_by": created_by,
                            }),
                        ))?;
                        Ok(ReviewOutcome {
                            transaction_id: transaction_id.to_string(),
                            decision,
                            audit_entry_id: entry.id,
                        })
                    }
                    ApprovalCheck::SegregationViolation => {
                        tracing::warn!(
                            actor = %actor.id,
                            transaction = transaction_id,
                            "segregation-of-duties violation attempt"
                        );
                        chain.append(AppendRequest::new(
                            ENTITY_TRANSACTION,
                            transaction_id,
                            action::SEGREGATION_VIOLATION,
                            &actor.id,
                            actor.role.to_string(),
                            json!({ "attempted": decision.to_string() }),
                        ))?;
                        Err(PipelineError::SegregationViolation {
                            actor_id: actor.id.clone(),
                            transaction_id: transaction_id.to_string(),
                        })
                    }
                    ApprovalCheck::InsufficientPermissions => {
                        Err(PipelineError::PermissionDenied { role: actor.role })
                    }
                }
            };

            // The violation entry must survive the failed request
            match &result {
                Ok(_) | Err(PipelineError::SegregationViolation { .. }) => db.commit()?,
                Err(_) => {}
            }
            result
        })
        .await
    }

    /// Idempotent transition of an alert to reviewed.
    ///
    /// Only the first transition appends an `alert_reviewed` audit entry;
    /// repeats return the stored alert unchanged.
    pub async fn mark_alert_reviewed(
        &self,
        alert_id: &str,
        actor: &Actor,
    ) -> Result<Alert, PipelineError> {
        self.with_retries("mark_alert_reviewed", |conn| {
            let db = conn.transaction()?;
            let alert = {
                let alerts = AlertLedger::new(&db);
                let chain = AuditChain::new(&db);

                let (alert, changed) = alerts.mark_reviewed(alert_id)?;
                if changed {
                    chain.append(AppendRequest::new(
                        ENTITY_ALERT,
                        alert_id,
                        action::ALERT_REVIEWED,
                        &actor.id,
                        actor.role.to_string(),
                        json!({ "transaction_id": alert.transaction_id }),
                    ))?;
                }
                alert
            };
            db.commit()?;
            Ok(alert)
        })
        .await
    }

    /// Full-chain verification scan
    pub async fn verify_chain(&self) -> Result<ChainReport, PipelineError> {
        self.with_retries("verify_chain", |conn| Ok(AuditChain::new(conn).verify()?))
            .await
    }

    /// All unreviewed alerts, oldest first
    pub async fn unreviewed_alerts(&self) -> Result<Vec<Alert>, PipelineError> {
        self.with_retries("unreviewed_alerts", |conn| {
            Ok(AlertLedger::new(conn).list_unreviewed()?)
        })
        .await
    }

    /// A member's profile, if the member has been seen
    pub async fn member_profile(
        &self,
        member_id: &str,
    ) -> Result<Option<MemberProfile>, PipelineError> {
        self.with_retries("member_profile", |conn| {
            Ok(ProfileStore::new(conn).get(member_id)?)
        })
        .await
    }

    /// Audit entries for one entity, ascending
    pub async fn audit_trail(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditLogEntry>, PipelineError> {
        self.with_retries("audit_trail", |conn| {
            Ok(AuditChain::new(conn).entries_for_entity(entity_type, entity_id)?)
        })
        .await
    }

    /// Number of entries on the audit chain
    pub async fn chain_len(&self) -> Result<u64, PipelineError> {
        self.with_retries("chain_len", |conn| Ok(AuditChain::new(conn).len()?))
            .await
    }

    /// Run a store operation under the connection lock, retrying transient
    /// failures with bounded exponential backoff. Exhaustion surfaces as
    /// [`PipelineError::StoreUnavailable`] with nothing applied.
    async fn with_retries<T>(
        &self,
        op: &'static str,
        mut f: impl FnMut(&mut Connection) -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let mut attempt: u32 = 1;
        let mut delay = StdDuration::from_millis(self.retry.base_delay_ms);

        loop {
            let result = {
                let mut conn = self.conn.lock().await;
                f(&mut conn)
            };

            match result {
                Err(e) if e.is_transient() => {
                    if attempt >= self.retry.max_attempts {
                        return Err(PipelineError::StoreUnavailable {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    tracing::warn!(op, attempt, error = %e, "transient store failure, backing off");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
