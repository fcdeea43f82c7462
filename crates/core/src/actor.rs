//! Actors and roles
//!
//! Approval authority is a property of the role; the segregation-of-duties
//! check on actor identity lives in the approval crate.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Staff roles, lowest privilege first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Teller,
    Auditor,
    Manager,
    Admin,
}

impl Role {
    /// Whether this role may approve or reject transactions.
    /// Manager-tier and above only.
    pub fn can_approve(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

/// A staff member performing an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_authority() {
        assert!(!Role::Teller.can_approve());
        assert!(!Role::Auditor.can_approve());
        assert!(Role::Manager.can_approve());
        assert!(Role::Admin.can_approve());
    }

    #[test]
    fn test_role_string_round_trip() {
        assert_eq!(Role::Manager.to_string(), "manager");
        let parsed: Role = "teller".parse().unwrap();
        assert_eq!(parsed, Role::Teller);
    }

    #[test]
    fn test_actor_serialization() {
        let actor = Actor::new("u-17", Role::Admin);
        let json = serde_json::to_string(&actor).unwrap();
        assert!(json.contains("admin"));

        let parsed: Actor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, actor);
    }
}
