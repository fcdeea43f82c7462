//! FinWatch alert ledger
//!
//! An Alert is the persisted form of the single most severe signal a
//! transaction produced. Alerts are reviewable exactly once (repeat reviews
//! are no-ops) and are never deleted by the core.

pub mod alert;
pub mod ledger;

pub use alert::Alert;
pub use ledger::{AlertError, AlertLedger, MemberAlertStats};
