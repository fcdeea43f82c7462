//! Transaction - the immutable financial event under evaluation
//!
//! A transaction is created by exactly one actor and never modified
//! afterwards. Field validation runs before any detector sees it.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Errors from transaction field validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Transaction amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("Transaction id must not be empty")]
    EmptyTransactionId,

    #[error("Member id must not be empty")]
    EmptyMemberId,
}

/// Kind of financial transaction
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
    LoanDisbursement,
    LoanRepayment,
}

/// A single teller transaction.
///
/// `account_balance` is the balance AFTER the transaction was applied and
/// may legitimately carry any sign - a negative value is itself a fraud
/// indicator, not a validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub member_id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub transaction_type: TransactionType,
    pub account_balance: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_location: Option<String>,
}

impl Transaction {
    /// Create a validated transaction.
    pub fn new(
        transaction_id: impl Into<String>,
        member_id: impl Into<String>,
        amount: Decimal,
        timestamp: DateTime<Utc>,
        transaction_type: TransactionType,
        account_balance: Decimal,
    ) -> Result<Self, ValidationError> {
        let tx = Self {
            transaction_id: transaction_id.into(),
            member_id: member_id.into(),
            amount,
            timestamp,
            transaction_type,
            account_balance,
            device_fingerprint: None,
            geo_location: None,
        };
        tx.validate()?;
        Ok(tx)
    }

    /// Attach a device fingerprint
    pub fn with_device(mut self, fingerprint: impl Into<String>) -> Self {
        self.device_fingerprint = Some(fingerprint.into());
        self
    }

    /// Attach a geo-location string
    pub fn with_geo(mut self, location: impl Into<String>) -> Self {
        self.geo_location = Some(location.into());
        self
    }

    /// Check field invariants. Runs before detection.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.transaction_id.trim().is_empty() {
            return Err(ValidationError::EmptyTransactionId);
        }
        if self.member_id.trim().is_empty() {
            return Err(ValidationError::EmptyMemberId);
        }
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(self.amount));
        }
        Ok(())
    }

    /// Hour-of-day (0-23) of the transaction's own timestamp
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    /// Weekday of the transaction's own timestamp
    pub fn weekday(&self) -> Weekday {
        self.timestamp.weekday()
    }

    /// Amount as f64 for statistical math
    pub fn amount_f64(&self) -> f64 {
        self.amount.to_f64().unwrap_or(0.0)
    }

    /// Resulting balance as f64 for statistical math
    pub fn balance_f64(&self) -> f64 {
        self.account_balance.to_f64().unwrap_or(0.0)
    }

    pub fn is_withdrawal(&self) -> bool {
        self.transaction_type == TransactionType::Withdrawal
    }

    pub fn is_deposit(&self) -> bool {
        self.transaction_type == TransactionType::Deposit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, hour, 30, 0).unwrap()
    }

    #[test]
    fn test_valid_transaction() {
        let tx = Transaction::new(
            "TX-1",
            "M-100",
            dec!(250),
            ts(10),
            TransactionType::Deposit,
            dec!(1250),
        )
        .unwrap();

        assert_eq!(tx.hour(), 10);
        assert!(tx.is_deposit());
        assert!(!tx.is_withdrawal());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let result = Transaction::new(
            "TX-1",
            "M-100",
            Decimal::ZERO,
            ts(10),
            TransactionType::Deposit,
            dec!(1000),
        );
        assert!(matches!(result, Err(ValidationError::NonPositiveAmount(_))));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let result = Transaction::new(
            "TX-1",
            "M-100",
            dec!(-50),
            ts(10),
            TransactionType::Withdrawal,
            dec!(1000),
        );
        assert!(matches!(result, Err(ValidationError::NonPositiveAmount(_))));
    }

    #[test]
    fn test_empty_ids_rejected() {
        let result = Transaction::new(
            "  ",
            "M-100",
            dec!(50),
            ts(10),
            TransactionType::Deposit,
            dec!(1000),
        );
        assert!(matches!(result, Err(ValidationError::EmptyTransactionId)));

        let result = Transaction::new(
            "TX-1",
            "",
            dec!(50),
            ts(10),
            TransactionType::Deposit,
            dec!(1000),
        );
        assert!(matches!(result, Err(ValidationError::EmptyMemberId)));
    }

    #[test]
    fn test_negative_balance_is_valid() {
        // Overdraft is a detector concern, not a validation failure
        let tx = Transaction::new(
            "TX-1",
            "M-100",
            dec!(500),
            ts(10),
            TransactionType::Withdrawal,
            dec!(-120),
        );
        assert!(tx.is_ok());
    }

    #[test]
    fn test_type_string_round_trip() {
        assert_eq!(TransactionType::LoanDisbursement.to_string(), "loan_disbursement");
        let parsed: TransactionType = "withdrawal".parse().unwrap();
        assert_eq!(parsed, TransactionType::Withdrawal);
    }

    #[test]
    fn test_serialization() {
        let tx = Transaction::new(
            "TX-1",
            "M-100",
            dec!(250),
            ts(10),
            TransactionType::Transfer,
            dec!(1250),
        )
        .unwrap()
        .with_geo("branch-12");

        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("transfer"));
        assert!(json.contains("branch-12"));
        assert!(!json.contains("device_fingerprint"));

        let parsed: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tx);
    }
}
