//! # Ancestor chain builder (C5)
//!
//! Reconstructs the root-first chain of record-writes by walking `parentId`
//! pointers through the store, as required before a protocol authorizer can
//! check `protocolPath`/`contextId` continuity or an `of`-scoped action rule
//! (§4.6 steps 3 and 6).

use std::collections::HashSet;

use crate::provider::MessageStore;
use crate::records::{RecordsFilter, Write};
use crate::{Error, Result};

/// Protocol definitions may nest at most this many levels (mirrors the
/// teacher's `role_paths` depth guard), which bounds how long a legitimate
/// ancestor chain can be and gives `AncestorCycle` a concrete trigger.
const MAX_CHAIN_DEPTH: usize = 10;

/// Fetch the initial (first) write for `record_id`, or `None` if no write
/// with that ID exists.
pub(crate) async fn initial_write(
    owner: &str, protocol: &str, record_id: &str, store: &impl MessageStore,
) -> Result<Option<Write>> {
    let filter = RecordsFilter::new()
        .record_id(record_id)
        .protocol(protocol)
        .is_latest_base_state(false);
    let entries = store.find(owner, filter).await?;

    for entry in entries {
        if let Some(write) = entry.as_write() {
            if write.is_initial()? {
                return Ok(Some(write.clone()));
            }
        }
    }
    Ok(None)
}

/// Build the root-first ancestor chain for `record_id`: the initial write of
/// each ancestor, starting from the protocol root and ending with
/// `record_id`'s own initial write.
///
/// # Errors
/// [`Error::AncestorNotFound`] if any `parentId` in the chain cannot be
/// resolved to a stored write; [`Error::AncestorCycle`] if the chain exceeds
/// [`MAX_CHAIN_DEPTH`], which can only happen if `parentId` pointers loop.
pub async fn build_ancestor_chain(
    owner: &str, protocol: &str, record_id: &str, store: &impl MessageStore,
) -> Result<Vec<Write>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(record_id.to_string());

    while let Some(id) = current {
        if !seen.insert(id.clone()) || chain.len() > MAX_CHAIN_DEPTH {
            return Err(Error::AncestorCycle(format!(
                "record {record_id} has a cyclic or too-deep parent chain"
            )));
        }

        let Some(write) = initial_write(owner, protocol, &id, store).await? else {
            return Err(Error::AncestorNotFound(format!(
                "no initial write found for ancestor {id}"
            )));
        };

        let parent_id = write.descriptor.parent_id.clone();
        chain.push(write);
        current = parent_id;
    }

    chain.reverse();
    Ok(chain)
}
