//! # Records
//!
//! Types describing `Records` interface messages: the filter used to query
//! for them, and the `Write`/`Delete` shapes the authorization core reads
//! fields from. Full message processing (validation of attestations,
//! encryption properties, tag schemas beyond what protocol rule sets check)
//! is a method-handler concern and out of scope here.

mod chain;
mod delete;
mod identity;
mod protocol;
mod write;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use self::chain::build_ancestor_chain;
pub use self::delete::{Delete, DeleteDescriptor};
pub use self::identity::{is_initial_write, record_id};
pub use self::protocol::Authorizer;
pub use self::write::{Attestation, DelegatedGrant, Write, WriteDescriptor};
use crate::{DateRange, OneOrMany, Range, utils};

/// Records filter, used both by the store's query interface and internally
/// by the authorization pipeline to look up ancestors, role records, and
/// protocol definitions.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsFilter {
    /// Restrict to a single interface. Filters are applied across every
    /// message kind the store holds, not only `Records`, so the
    /// authorization core can also look up stored `ProtocolsConfigure`
    /// messages to resolve protocol definitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<crate::Interface>,

    /// Restrict to a single method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<crate::Method>,

    /// Get a single record by its ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,

    /// Records matching the specified author(s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<OneOrMany<String>>,

    /// Records matching the specified recipient(s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<OneOrMany<String>>,

    /// Records with the specified context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// The record ID of the parent record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Records belonging to the specified protocol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Records at the specified protocol path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_path: Option<String>,

    /// Records with the specified schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Records with the specified MIME data format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_format: Option<String>,

    /// Records matching the specified tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, TagFilter>>,

    /// Records whose data has the specified CID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_cid: Option<String>,

    /// Records published (or not) as specified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,

    /// Only the latest base state for each record ID (excludes superseded
    /// writes); `false` to include the full history for a record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_latest_base_state: Option<bool>,

    /// Records created within the specified range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateRange>,
}

/// Tag filter value, matched against a `$tags` rule-set or a `RecordsFilter`
/// tag constraint.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TagFilter {
    /// Match tags starting with a string value.
    StartsWith(String),
    /// Filter tags by numeric range.
    Range(Range<usize>),
    /// Filter by an exact value.
    Equal(Value),
}

impl Default for TagFilter {
    fn default() -> Self {
        Self::Equal(Value::Null)
    }
}

impl RecordsFilter {
    /// Returns a new, empty [`RecordsFilter`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Match a single author.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(OneOrMany::One(author.into()));
        self
    }

    /// Match a single recipient.
    #[must_use]
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(OneOrMany::One(recipient.into()));
        self
    }

    /// Restrict to a single interface.
    #[must_use]
    pub const fn interface(mut self, interface: crate::Interface) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Restrict to a single method.
    #[must_use]
    pub const fn method(mut self, method: crate::Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Match the given protocol, normalized (trailing slash trimmed) so a
    /// caller-supplied URI compares equal to a stored record's own
    /// normalized `protocol`.
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(utils::clean_url(&protocol.into()));
        self
    }

    /// Match the given protocol path.
    #[must_use]
    pub fn protocol_path(mut self, protocol_path: impl Into<String>) -> Self {
        self.protocol_path = Some(protocol_path.into());
        self
    }

    /// Match the given record ID.
    #[must_use]
    pub fn record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    /// Match the given parent ID.
    #[must_use]
    pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Match the given context ID.
    #[must_use]
    pub fn context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Restrict matches to the latest base state (or, with `false`, include
    /// superseded writes too).
    #[must_use]
    pub const fn is_latest_base_state(mut self, value: bool) -> Self {
        self.is_latest_base_state = Some(value);
        self
    }
}
