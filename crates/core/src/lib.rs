//! FinWatch core - shared domain vocabulary
//!
//! Every other crate in the workspace builds on these types:
//! - `Transaction`: an immutable financial event under evaluation
//! - `Signal` / `Severity`: detector output before persistence
//! - `Actor` / `Role`: who performs state-changing actions
//! - `DetectionConfig`: every tunable threshold in one place

pub mod actor;
pub mod config;
pub mod signal;
pub mod transaction;

pub use actor::{Actor, Role};
pub use config::{DetectionConfig, LongitudinalWeights, ScoreWeights, TierConfidence};
pub use signal::{most_severe, Severity, Signal, SignalKind};
pub use transaction::{Transaction, TransactionType, ValidationError};
