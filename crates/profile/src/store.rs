//! SQLite storage for member profiles
//!
//! The store borrows its connection so callers can run profile writes inside
//! a larger transaction (ingestion commits profile, alert, and audit entry
//! together or not at all).

use crate::member::MemberProfile;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors from the profile store
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Repository over the `member_profiles` table
pub struct ProfileStore<'c> {
    conn: &'c Connection,
}

impl<'c> ProfileStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Create the schema if it does not exist
    pub fn init(&self) -> Result<(), ProfileError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS member_profiles (
                member_id TEXT PRIMARY KEY,
                mean_amount REAL NOT NULL,
                m2 REAL NOT NULL,
                transaction_count INTEGER NOT NULL,
                typical_hours TEXT NOT NULL,
                risk_score REAL NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Fetch a profile, `None` if the member has never been seen
    pub fn get(&self, member_id: &str) -> Result<Option<MemberProfile>, ProfileError> {
        let row = self
            .conn
            .query_row(
                "SELECT member_id, mean_amount, m2, transaction_count, typical_hours, risk_score
                 FROM member_profiles WHERE member_id = ?1",
                params![member_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, u64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, f64>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((member_id, mean_amount, m2, transaction_count, hours_json, risk_score)) = row
        else {
            return Ok(None);
        };

        let typical_hours: BTreeSet<u32> = serde_json::from_str(&hours_json)?;

        Ok(Some(MemberProfile {
            member_id,
            mean_amount,
            m2,
            transaction_count,
            typical_hours,
            risk_score,
        }))
    }

    /// Fetch a profile, falling back to a fresh one
    pub fn get_or_default(&self, member_id: &str) -> Result<MemberProfile, ProfileError> {
        Ok(self
            .get(member_id)?
            .unwrap_or_else(|| MemberProfile::new(member_id)))
    }

    /// Insert or replace a profile
    pub fn upsert(&self, profile: &MemberProfile) -> Result<(), ProfileError> {
        let hours_json = serde_json::to_string(&profile.typical_hours)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO member_profiles
             (member_id, mean_amount, m2, transaction_count, typical_hours, risk_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                profile.member_id,
                profile.mean_amount,
                profile.m2,
                profile.transaction_count,
                hours_json,
                profile.risk_score,
            ],
        )?;
        Ok(())
    }

    /// All known profiles (peer comparison input)
    pub fn all(&self) -> Result<Vec<MemberProfile>, ProfileError> {
        let mut stmt = self.conn.prepare(
            "SELECT member_id FROM member_profiles ORDER BY member_id",
        )?;
        let ids: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut profiles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(profile) = self.get(&id)? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use finwatch_core::{Transaction, TransactionType};
    use rust_decimal::Decimal;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ProfileStore::new(&conn).init().unwrap();
        conn
    }

    fn sample_tx(member: &str, amount: i64) -> Transaction {
        Transaction::new(
            format!("TX-{}", amount),
            member,
            Decimal::new(amount, 0),
            Utc.with_ymd_and_hms(2024, 3, 15, 11, 0, 0).unwrap(),
            TransactionType::Deposit,
            Decimal::new(amount * 3, 0),
        )
        .unwrap()
    }

    #[test]
    fn test_get_missing_returns_none() {
        let conn = open();
        let store = ProfileStore::new(&conn);
        assert!(store.get("M-none").unwrap().is_none());
    }

    #[test]
    fn test_upsert_round_trip() {
        let conn = open();
        let store = ProfileStore::new(&conn);

        let mut profile = MemberProfile::new("M-1");
        for amount in [100, 250, 400] {
            profile.observe(&sample_tx("M-1", amount));
        }
        profile.set_risk_score(0.35);
        store.upsert(&profile).unwrap();

        let loaded = store.get("M-1").unwrap().unwrap();
        assert_eq!(loaded, profile);
        assert_eq!(loaded.transaction_count, 3);
        assert!(loaded.is_typical_hour(11));
    }

    #[test]
    fn test_upsert_replaces() {
        let conn = open();
        let store = ProfileStore::new(&conn);

        let mut profile = MemberProfile::new("M-1");
        profile.observe(&sample_tx("M-1", 100));
        store.upsert(&profile).unwrap();

        profile.observe(&sample_tx("M-1", 900));
        store.upsert(&profile).unwrap();

        let loaded = store.get("M-1").unwrap().unwrap();
        assert_eq!(loaded.transaction_count, 2);
    }

    #[test]
    fn test_all_profiles() {
        let conn = open();
        let store = ProfileStore::new(&conn);

        for member in ["M-1", "M-2", "M-3"] {
            let mut profile = MemberProfile::new(member);
            profile.observe(&sample_tx(member, 500));
            store.upsert(&profile).unwrap();
        }

        let all = store.all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].member_id, "M-1");
    }

    #[test]
    fn test_get_or_default() {
        let conn = open();
        let store = ProfileStore::new(&conn);

        let fresh = store.get_or_default("M-new").unwrap();
        assert_eq!(fresh.member_id, "M-new");
        assert_eq!(fresh.transaction_count, 0);
    }
}
