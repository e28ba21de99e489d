//! # Decentralized Web Node — authorization core
//!
//! This crate implements the authorization and protocol-enforcement
//! pipeline shared by every Decentralized Web Node method handler: message
//! integrity validation, signature authentication, canonical (owner-only)
//! authorization, protocol-based authorization, permission-grant
//! authorization, and the supporting content-addressing and ordering
//! primitives those checks depend on.
//!
//! Message stores, DID resolvers, JWS signers, and method handlers are
//! external collaborators: this crate defines the traits it needs from them
//! ([`provider::MessageStore`], [`provider::DidResolver`]) but not their
//! implementations.

pub mod auth;
pub mod cid;
mod context;
mod error;
pub mod ordering;
pub mod permissions;
pub mod protocols;
pub mod provider;
pub mod records;
pub mod store;
mod utils;

pub use context::Context;
pub use error::{Category, Error, Result};
use serde::{Deserialize, Serialize};

/// The four top-level message interfaces.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "PascalCase")]
pub enum Interface {
    /// Record storage and retrieval.
    #[default]
    Records,
    /// Protocol definitions.
    Protocols,
    /// Permission grants, requests, and revocations.
    Permissions,
    /// Arbitrary-message query/read/subscribe.
    Messages,
}

impl std::fmt::Display for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self).unwrap_or_default();
        write!(f, "{}", s.as_str().unwrap_or_default())
    }
}

/// The method named by a message descriptor.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "PascalCase")]
pub enum Method {
    /// Create or update a record.
    Write,
    /// Fetch a single record.
    #[default]
    Read,
    /// Fetch multiple records/messages.
    Query,
    /// Subscribe to matching records/messages.
    Subscribe,
    /// Mark a record deleted (optionally pruning descendants).
    Delete,
    /// Install or replace a protocol definition.
    Configure,
    /// Create a permission grant.
    Grant,
    /// Request a permission grant.
    Request,
    /// Revoke a permission grant.
    Revoke,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self).unwrap_or_default();
        write!(f, "{}", s.as_str().unwrap_or_default())
    }
}

/// Fields common to every message descriptor.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// The interface the message targets.
    pub interface: Interface,

    /// The method the message invokes.
    pub method: Method,

    /// ISO-8601 UTC timestamp, microsecond precision, set when the message
    /// was created. Used for total ordering (see [`ordering`]).
    pub message_timestamp: String,
}

/// Holds either a single value or a set of values, used for filter fields
/// that may match one or many DIDs.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single value.
    One(T),
    /// A set of values, any of which matches.
    Many(Vec<T>),
}

impl<T: PartialEq + Clone> OneOrMany<T> {
    /// Returns `true` if `value` matches this filter.
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        match self {
            Self::One(one) => one == value,
            Self::Many(many) => many.contains(value),
        }
    }

    /// Flatten into a `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            Self::One(one) => vec![one.clone()],
            Self::Many(many) => many.clone(),
        }
    }
}

/// Inclusive/exclusive lower bound.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Lower<T> {
    /// `>=` the contained value.
    Inclusive(T),
    /// `>` the contained value.
    Exclusive(T),
}

/// Inclusive/exclusive upper bound.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Upper<T> {
    /// `<=` the contained value.
    Inclusive(T),
    /// `<` the contained value.
    Exclusive(T),
}

/// A generic range filter over an orderable value.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Range<T> {
    /// Lower bound, if any.
    pub lower: Option<Lower<T>>,
    /// Upper bound, if any.
    pub upper: Option<Upper<T>>,
}

impl<T: PartialOrd> Range<T> {
    /// Returns `true` if `value` falls within the range.
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        let lower_ok = match &self.lower {
            Some(Lower::Inclusive(b)) => value >= b,
            Some(Lower::Exclusive(b)) => value > b,
            None => true,
        };
        let upper_ok = match &self.upper {
            Some(Upper::Inclusive(b)) => value <= b,
            Some(Upper::Exclusive(b)) => value < b,
            None => true,
        };
        lower_ok && upper_ok
    }
}

/// A range over `chrono::DateTime<Utc>`, used by date-range filter fields.
pub type DateRange = Range<chrono::DateTime<chrono::Utc>>;
