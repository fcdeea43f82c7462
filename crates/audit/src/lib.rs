//! FinWatch audit chain
//!
//! Every sensitive action lands here as a write-once entry whose digest
//! covers the entry's canonical content plus the previous entry's digest.
//! Retroactive edits therefore break the chain at a verifiable position.
//!
//! The append path is the system's critical section: callers must serialize
//! appends (the pipeline funnels every write through one locked connection),
//! and a UNIQUE constraint on `prev_hash` turns any fork that slips through
//! into a hard conflict instead of silent corruption.

pub mod chain;
pub mod entry;
pub mod hash;

pub use chain::{AuditChain, AuditError, ChainReport};
pub use entry::{action, AppendRequest, AuditLogEntry, GENESIS_HASH};
pub use hash::entry_digest;
