//! FinWatch profiles - rolling per-member statistics
//!
//! A `MemberProfile` carries the running mean/stddev of a member's
//! transaction amounts, the hours of day they usually transact, and a
//! longitudinal risk score in [0, 1]. Profiles are updated incrementally as
//! transactions are ingested and are never deleted.

pub mod member;
pub mod store;

pub use member::MemberProfile;
pub use store::{ProfileError, ProfileStore};
