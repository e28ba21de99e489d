//! # Newest-message arbitrator (C8)
//!
//! A total order over messages of the same kind, used to decide which of two
//! competing `RecordsWrite`s (or `ProtocolsConfigure`s) is newest: compare
//! `messageTimestamp` lexicographically, tiebreaking on the message CID.
//! Both inputs are canonical (ISO-8601 UTC microsecond timestamps, CIDv1
//! over canonical CBOR), so the order is deterministic across
//! implementations without either side needing to parse a timestamp into a
//! calendar type.

use std::cmp::Ordering;

use crate::store::Entry;
use crate::{Descriptor, Result};

/// Compare two messages' descriptors and CIDs for recency. `Greater` means
/// `a` is newer than `b`.
#[must_use]
pub fn compare(a_timestamp: &str, a_cid: &str, b_timestamp: &str, b_cid: &str) -> Ordering {
    a_timestamp.cmp(b_timestamp).then_with(|| a_cid.cmp(b_cid))
}

/// Compare two stored entries for recency (C8): by
/// [`Descriptor::message_timestamp`], then by the CID of the entry's full
/// type-specific descriptor ([`Entry::cid`]) — not the three fields common
/// to every message ([`Entry::descriptor`]), which two different `Write`s
/// (or `Configure`s) sharing a `messageTimestamp` would also share, making
/// the tiebreak a no-op.
///
/// # Errors
/// Returns an error if either entry's descriptor cannot be serialized to
/// compute its CID.
pub fn compare_entries(a: &Entry, b: &Entry) -> Result<Ordering> {
    let a_cid = a.cid()?;
    let b_cid = b.cid()?;
    Ok(compare(&a.descriptor().message_timestamp, &a_cid, &b.descriptor().message_timestamp, &b_cid))
}

/// Returns `true` if `candidate` is newer than every entry in `existing`,
/// i.e. is the one that should win and be retained.
///
/// # Errors
/// As [`compare`].
pub fn is_newest<'a>(
    candidate: &Descriptor, candidate_cid: &str, existing: impl IntoIterator<Item = (&'a Descriptor, &'a str)>,
) -> Result<bool> {
    for (other, other_cid) in existing {
        let ord = compare(&candidate.message_timestamp, candidate_cid, &other.message_timestamp, other_cid);
        if ord != Ordering::Greater {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_timestamp_wins() {
        let ord = compare("2024-01-01T00:00:00.000000Z", "cidA", "2024-01-02T00:00:00.000000Z", "cidB");
        assert_eq!(ord, Ordering::Less);
    }

    #[test]
    fn equal_timestamp_breaks_on_cid() {
        let ts = "2024-01-01T00:00:00.000000Z";
        let ord = compare(ts, "cidB", ts, "cidA");
        assert_eq!(ord, Ordering::Greater);
    }

    #[test]
    fn identical_messages_are_equal() {
        let ts = "2024-01-01T00:00:00.000000Z";
        let ord = compare(ts, "cid", ts, "cid");
        assert_eq!(ord, Ordering::Equal);
    }

    #[test]
    fn is_newest_rejects_tie() {
        let ts = "2024-01-01T00:00:00.000000Z";
        let descriptor = crate::Descriptor {
            interface: crate::Interface::Protocols,
            method: crate::Method::Configure,
            message_timestamp: ts.to_string(),
        };
        let existing = vec![(&descriptor, "cid")];
        let result = is_newest(&descriptor, "cid", existing).unwrap();
        assert!(!result);
    }
}
