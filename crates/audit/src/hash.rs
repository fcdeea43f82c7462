//! Entry digest computation
//!
//! The digest is SHA-256 over the canonical JSON form of the entry's
//! content concatenated with the previous entry's digest. serde_json
//! serializes object keys in sorted order (BTreeMap-backed maps), which is
//! what makes the canonical form stable across processes.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Canonical JSON string of an entry's hashed content.
///
/// `id` and `created_at` are store bookkeeping and deliberately excluded;
/// the chain guards WHAT was done and by WHOM, in WHAT order.
pub fn canonical_content(
    entity_type: &str,
    entity_id: &str,
    action: &str,
    actor_id: &str,
    actor_role: &str,
    payload: &Value,
) -> String {
    json!({
        "entity_type": entity_type,
        "entity_id": entity_id,
        "action": action,
        "actor_id": actor_id,
        "actor_role": actor_role,
        "payload": payload,
    })
    .to_string()
}

/// SHA-256 digest over `canonical_content || prev_hash`, hex encoded
pub fn entry_digest(
    entity_type: &str,
    entity_id: &str,
    action: &str,
    actor_id: &str,
    actor_role: &str,
    payload: &Value,
    prev_hash: &str,
) -> String {
    let canonical = canonical_content(
        entity_type,
        entity_id,
        action,
        actor_id,
        actor_role,
        payload,
    );

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(prev_hash.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::GENESIS_HASH;

    #[test]
    fn test_digest_deterministic() {
        let payload = json!({"amount": "100", "status": "held"});
        let a = entry_digest("transaction", "TX-1", "created", "u-1", "teller", &payload, GENESIS_HASH);
        let b = entry_digest("transaction", "TX-1", "created", "u-1", "teller", &payload, GENESIS_HASH);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_digest_changes_with_payload() {
        let a = entry_digest(
            "transaction", "TX-1", "created", "u-1", "teller",
            &json!({"amount": "100"}), GENESIS_HASH,
        );
        let b = entry_digest(
            "transaction", "TX-1", "created", "u-1", "teller",
            &json!({"amount": "101"}), GENESIS_HASH,
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_changes_with_prev_hash() {
        let payload = json!({"amount": "100"});
        let a = entry_digest("transaction", "TX-1", "created", "u-1", "teller", &payload, GENESIS_HASH);
        let b = entry_digest("transaction", "TX-1", "created", "u-1", "teller", &payload, &a);
        assert_ne!(a, b);
    }

    #[test]
    fn test_canonical_key_order_is_stable() {
        // serde_json sorts object keys, so insertion order cannot leak in
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(a.to_string(), b.to_string());
    }
}
