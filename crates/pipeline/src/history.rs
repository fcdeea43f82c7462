//! Transaction rows and the history queries behind the evaluation context
//!
//! Conceptually the relational transaction store belongs to the surrounding
//! application; the pipeline keeps its own table because the detectors need
//! trailing-window history and system activity counts.

use crate::error::PipelineError;
use chrono::{DateTime, Duration, Utc};
use finwatch_core::{Transaction, TransactionType};
use finwatch_detect::SystemActivity;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;

/// Repository over the `transactions` table
pub struct TransactionStore<'c> {
    conn: &'c Connection,
}

impl<'c> TransactionStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Create the schema if it does not exist
    pub fn init(&self) -> Result<(), PipelineError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                transaction_id TEXT PRIMARY KEY,
                member_id TEXT NOT NULL,
                amount TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                transaction_type TEXT NOT NULL,
                account_balance TEXT NOT NULL,
                device_fingerprint TEXT,
                geo_location TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_member_time
             ON transactions(member_id, timestamp)",
            [],
        )?;

        Ok(())
    }

    /// Insert a transaction row. A duplicate id is a [`PipelineError::DuplicateTransaction`].
    pub fn insert(&self, tx: &Transaction) -> Result<(), PipelineError> {
        let result = self.conn.execute(
            "INSERT INTO transactions
             (transaction_id, member_id, amount, timestamp, transaction_type,
              account_balance, device_fingerprint, geo_location)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                tx.transaction_id,
                tx.member_id,
                tx.amount.to_string(),
                tx.timestamp.to_rfc3339(),
                tx.transaction_type.to_string(),
                tx.account_balance.to_string(),
                tx.device_fingerprint,
                tx.geo_location,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(PipelineError::DuplicateTransaction(
                    tx.transaction_id.clone(),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The member's transactions within the trailing window before `at`,
    /// ascending by timestamp, excluding anything at or after `at`.
    pub fn recent_for_member(
        &self,
        member_id: &str,
        at: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<Transaction>, PipelineError> {
        let from = (at - window).to_rfc3339();
        let to = at.to_rfc3339();

        let mut stmt = self.conn.prepare(
            "SELECT transaction_id, member_id, amount, timestamp, transaction_type,
                    account_balance, device_fingerprint, geo_location
             FROM transactions
             WHERE member_id = ?1 AND timestamp >= ?2 AND timestamp < ?3
             ORDER BY timestamp ASC",
        )?;

        let rows = stmt.query_map(params![member_id, from, to], row_to_transaction)?;
        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row??);
        }
        Ok(transactions)
    }

    /// Count of ALL transactions in a half-open window `(from, to]`
    pub fn count_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, PipelineError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE timestamp > ?1 AND timestamp <= ?2",
            params![from.to_rfc3339(), to.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// System activity summary as of `at`
    pub fn system_activity(&self, at: DateTime<Utc>) -> Result<SystemActivity, PipelineError> {
        let transactions_last_24h = self.count_between(at - Duration::hours(24), at)?;
        let month_count = self.count_between(at - Duration::days(30), at)?;

        Ok(SystemActivity {
            transactions_last_24h,
            daily_average_30d: month_count as f64 / 30.0,
        })
    }
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Result<Transaction, PipelineError>> {
    let transaction_id: String = row.get(0)?;
    let amount_str: String = row.get(2)?;
    let timestamp_str: String = row.get(3)?;
    let type_str: String = row.get(4)?;
    let balance_str: String = row.get(5)?;

    let amount = amount_str.parse::<Decimal>();
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str);
    let transaction_type = type_str.parse::<TransactionType>();
    let account_balance = balance_str.parse::<Decimal>();

    let (Ok(amount), Ok(timestamp), Ok(transaction_type), Ok(account_balance)) =
        (amount, timestamp, transaction_type, account_balance)
    else {
        return Ok(Err(PipelineError::MalformedRecord {
            id: transaction_id,
            field: "amount/timestamp/type/balance",
        }));
    };

    Ok(Ok(Transaction {
        transaction_id,
        member_id: row.get(1)?,
        amount,
        timestamp: timestamp.with_timezone(&Utc),
        transaction_type,
        account_balance,
        device_fingerprint: row.get(6)?,
        geo_location: row.get(7)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        TransactionStore::new(&conn).init().unwrap();
        conn
    }

    fn tx_at(id: &str, member: &str, day: u32, hour: u32) -> Transaction {
        Transaction::new(
            id,
            member,
            dec!(100),
            Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
            TransactionType::Deposit,
            dec!(1000),
        )
        .unwrap()
    }

    #[test]
    fn test_insert_and_query_round_trip() {
        let conn = open();
        let store = TransactionStore::new(&conn);

        let tx = tx_at("TX-1", "M-1", 10, 9).with_geo("branch-3");
        store.insert(&tx).unwrap();

        let at = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let recent = store
            .recent_for_member("M-1", at, Duration::days(30))
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0], tx);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let conn = open();
        let store = TransactionStore::new(&conn);

        store.insert(&tx_at("TX-1", "M-1", 10, 9)).unwrap();
        let result = store.insert(&tx_at("TX-1", "M-1", 11, 9));
        assert!(matches!(
            result,
            Err(PipelineError::DuplicateTransaction(id)) if id == "TX-1"
        ));
    }

    #[test]
    fn test_recent_is_member_scoped_and_windowed() {
        let conn = open();
        let store = TransactionStore::new(&conn);

        store.insert(&tx_at("TX-1", "M-1", 1, 9)).unwrap();
        store.insert(&tx_at("TX-2", "M-1", 14, 9)).unwrap();
        store.insert(&tx_at("TX-3", "M-2", 14, 10)).unwrap();
        // At the query boundary itself - excluded
        store.insert(&tx_at("TX-4", "M-1", 15, 12)).unwrap();

        let at = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let recent = store
            .recent_for_member("M-1", at, Duration::days(10))
            .unwrap();

        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].transaction_id, "TX-2");
    }

    #[test]
    fn test_recent_is_ascending() {
        let conn = open();
        let store = TransactionStore::new(&conn);

        store.insert(&tx_at("TX-2", "M-1", 12, 9)).unwrap();
        store.insert(&tx_at("TX-1", "M-1", 10, 9)).unwrap();
        store.insert(&tx_at("TX-3", "M-1", 14, 9)).unwrap();

        let at = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let recent = store
            .recent_for_member("M-1", at, Duration::days(30))
            .unwrap();

        let ids: Vec<&str> = recent.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["TX-1", "TX-2", "TX-3"]);
    }

    #[test]
    fn test_system_activity() {
        let conn = open();
        let store = TransactionStore::new(&conn);

        // 14 transactions on March 1st, one on the 15th
        for i in 0..14 {
            store
                .insert(&tx_at(&format!("TX-old-{}", i), "M-1", 1, 9))
                .unwrap();
        }
        store.insert(&tx_at("TX-new", "M-2", 15, 9)).unwrap();

        let at = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let activity = store.system_activity(at).unwrap();

        assert_eq!(activity.transactions_last_24h, 1);
        assert!((activity.daily_average_30d - 0.5).abs() < 1e-9);
    }
}
