//! # Records Delete

use serde::{Deserialize, Serialize};

use crate::Descriptor;
use crate::auth::Authorization;

/// A `RecordsDelete` message: marks a record deleted, optionally pruning its
/// descendants. The `Write` record itself is never removed from the store
/// by this core; a delete is just another message subject to the same
/// authorization pipeline.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delete {
    /// The delete descriptor.
    pub descriptor: DeleteDescriptor,

    /// The message authorization.
    pub authorization: Authorization,
}

/// `RecordsDelete` descriptor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDescriptor {
    /// Fields common to every descriptor.
    #[serde(flatten)]
    pub base: Descriptor,

    /// The ID of the record to delete.
    pub record_id: String,

    /// Whether descendant records should be pruned too.
    pub prune: bool,
}
