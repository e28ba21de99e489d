//! # Record identity (C9)
//!
//! Deterministic `recordId` derivation and initial-write detection. The
//! canonical ID of a record is the CID of its descriptor with the author
//! folded in, which is what ties a write irrevocably to whoever created it:
//! no later write, by any other author, can reuse the same `recordId`
//! without recomputing to a different value.

use serde::Serialize;
use serde_json::{Value, json};

use crate::Result;

/// Compute the canonical `recordId` for a `(descriptor, author)` pair.
///
/// # Errors
/// Returns an error if the descriptor cannot be serialized.
pub fn record_id(author: &str, descriptor: &impl Serialize) -> Result<String> {
    let mut value = serde_json::to_value(descriptor).map_err(|e| crate::unexpected!("{e}"))?;
    if let Value::Object(map) = &mut value {
        map.insert("author".to_string(), json!(author));
    }
    crate::cid::compute(&value)
}

/// `true` if `candidate_id` is the canonical `recordId` of `(author,
/// descriptor)` — i.e. this write is the record's initial write.
///
/// # Errors
/// Returns an error if the descriptor cannot be serialized.
pub fn is_initial_write(
    author: &str, descriptor: &impl Serialize, candidate_id: &str,
) -> Result<bool> {
    Ok(record_id(author, descriptor)? == candidate_id)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn record_id_is_deterministic() {
        let descriptor = json!({"dataCid": "abc", "dataFormat": "text/plain"});
        let a = record_id("did:example:alice", &descriptor).unwrap();
        let b = record_id("did:example:alice", &descriptor).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn record_id_depends_on_author() {
        let descriptor = json!({"dataCid": "abc", "dataFormat": "text/plain"});
        let alice = record_id("did:example:alice", &descriptor).unwrap();
        let bob = record_id("did:example:bob", &descriptor).unwrap();
        assert_ne!(alice, bob);
    }

    #[test]
    fn is_initial_write_matches_own_id() {
        let descriptor = json!({"dataCid": "abc", "dataFormat": "text/plain"});
        let id = record_id("did:example:alice", &descriptor).unwrap();
        assert!(is_initial_write("did:example:alice", &descriptor, &id).unwrap());
    }

    #[test]
    fn is_initial_write_rejects_rewrite_id() {
        let initial = json!({"dataCid": "abc", "dataFormat": "text/plain"});
        let rewrite = json!({"dataCid": "def", "dataFormat": "text/plain"});
        let id = record_id("did:example:alice", &initial).unwrap();
        assert!(!is_initial_write("did:example:alice", &rewrite, &id).unwrap());
    }
}
