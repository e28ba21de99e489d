//! # Store types
//!
//! The shape of what a [`crate::provider::MessageStore`] holds and is
//! queried with. The store itself — persistence, indexing, SQL/KV backing —
//! is an external collaborator; this module only fixes the vocabulary the
//! authorization core and its collaborator share.

pub use crate::records::RecordsFilter;
use crate::protocols::Configure;
use crate::records::{Delete, Write};
use crate::{Descriptor, Result};

/// A single stored message. The authorization core mostly looks at
/// `Records` messages (to walk ancestor chains, find role records, or locate
/// an initial write), but protocol-based authorization (C6) also needs read
/// access to stored `ProtocolsConfigure` messages to resolve a protocol
/// definition; other interfaces are opaque to it and a handler-level store
/// may hold more variants than this.
#[derive(Clone, Debug)]
pub enum Entry {
    /// A `RecordsWrite` message.
    Write(Write),
    /// A `RecordsDelete` message.
    Delete(Delete),
    /// A `ProtocolsConfigure` message.
    Configure(Configure),
}

impl Entry {
    /// Borrow this entry as a [`Write`], if it is one.
    #[must_use]
    pub const fn as_write(&self) -> Option<&Write> {
        match self {
            Self::Write(write) => Some(write),
            Self::Delete(_) | Self::Configure(_) => None,
        }
    }

    /// Borrow this entry as a [`Delete`], if it is one.
    #[must_use]
    pub const fn as_delete(&self) -> Option<&Delete> {
        match self {
            Self::Delete(delete) => Some(delete),
            Self::Write(_) | Self::Configure(_) => None,
        }
    }

    /// Borrow this entry as a [`Configure`], if it is one.
    #[must_use]
    pub const fn as_configure(&self) -> Option<&Configure> {
        match self {
            Self::Configure(configure) => Some(configure),
            Self::Write(_) | Self::Delete(_) => None,
        }
    }

    /// The descriptor common to every message shape.
    #[must_use]
    pub const fn descriptor(&self) -> &Descriptor {
        match self {
            Self::Write(write) => &write.descriptor.base,
            Self::Delete(delete) => &delete.descriptor.base,
            Self::Configure(configure) => &configure.descriptor.base,
        }
    }

    /// The CID of the message, computed from its descriptor.
    ///
    /// # Errors
    /// Returns an error if the descriptor cannot be serialized.
    pub fn cid(&self) -> Result<String> {
        match self {
            Self::Write(write) => crate::cid::compute(&write.descriptor),
            Self::Delete(delete) => crate::cid::compute(&delete.descriptor),
            Self::Configure(configure) => crate::cid::compute(&configure.descriptor),
        }
    }
}

/// A query against the store, one or more filters combined with `OR`
/// semantics (a message matching any filter is included), mirroring how a
/// handler composes several `RecordsFilter`s into one lookup.
#[derive(Clone, Debug, Default)]
pub struct RecordsQuery {
    /// The filters to match against.
    pub filters: Vec<RecordsFilter>,
}

impl RecordsQuery {
    /// Returns a new, empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter to the query.
    #[must_use]
    pub fn add_filter(mut self, filter: RecordsFilter) -> Self {
        self.filters.push(filter);
        self
    }
}
