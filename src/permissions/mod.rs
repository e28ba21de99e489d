//! # Permissions
//!
//! Permission-grant authorization (C7): the scope, conditions, and
//! expiry/revocation rules a `PermissionsGrant` record imposes on messages
//! invoking it. Grant/request/revocation message *construction* lives in
//! [`grant`]; this module's surface is what the protocol and grant
//! authorizers call to check an invoked grant.

mod grant;

use serde::{Deserialize, Serialize};

pub use self::grant::{
    Grant, GrantBuilder, GrantData, authorize_messages, authorize_records, fetch_grant,
};
use crate::{Interface, Method};

/// Scope of a permission grant: which interface/method it covers, and for
/// `Records`, which protocol (and optionally context/path) it is restricted
/// to.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "interface")]
pub enum Scope {
    /// Scope over the `Records` interface. Always protocol-restricted.
    Records {
        /// The method this scope covers.
        method: Method,
        /// The protocol this scope is restricted to.
        protocol: String,
        /// Further restriction to a context or protocol path.
        #[serde(flatten, skip_serializing_if = "Option::is_none")]
        options: Option<RecordsOptions>,
    },
    /// Scope over the `Messages` interface.
    Messages {
        /// The method this scope covers.
        method: Method,
        /// Protocol restriction, if any; unset means unrestricted.
        #[serde(skip_serializing_if = "Option::is_none")]
        protocol: Option<String>,
    },
    /// Scope over the `Protocols` interface.
    Protocols {
        /// The method this scope covers.
        method: Method,
        /// Protocol restriction, if any; unset means unrestricted.
        #[serde(skip_serializing_if = "Option::is_none")]
        protocol: Option<String>,
    },
}

impl Default for Scope {
    fn default() -> Self {
        Self::Records { method: Method::default(), protocol: String::new(), options: None }
    }
}

impl Scope {
    /// The interface this scope applies to.
    #[must_use]
    pub const fn interface(&self) -> Interface {
        match self {
            Self::Records { .. } => Interface::Records,
            Self::Messages { .. } => Interface::Messages,
            Self::Protocols { .. } => Interface::Protocols,
        }
    }

    /// The method this scope applies to.
    #[must_use]
    pub const fn method(&self) -> Method {
        match self {
            Self::Records { method, .. }
            | Self::Messages { method, .. }
            | Self::Protocols { method, .. } => *method,
        }
    }

    /// The protocol this scope is restricted to, if any.
    #[must_use]
    pub fn protocol(&self) -> Option<&str> {
        match self {
            Self::Records { protocol, .. } => Some(protocol),
            Self::Messages { protocol, .. } | Self::Protocols { protocol, .. } => {
                protocol.as_deref()
            }
        }
    }

    /// The records-specific scope restriction, if any.
    #[must_use]
    pub const fn records_options(&self) -> Option<&RecordsOptions> {
        match self {
            Self::Records { options, .. } => options.as_ref(),
            Self::Messages { .. } | Self::Protocols { .. } => None,
        }
    }
}

/// Further restriction on a [`Scope::Records`] grant, to a single context or
/// a single protocol path. Mutually exclusive.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordsOptions {
    /// Restrict to records within this context.
    ContextId(String),
    /// Restrict to records at this protocol path.
    ProtocolPath(String),
}

impl RecordsOptions {
    /// The context ID restriction, if this is a context restriction.
    #[must_use]
    pub fn context_id(&self) -> Option<&str> {
        match self {
            Self::ContextId(id) => Some(id),
            Self::ProtocolPath(_) => None,
        }
    }

    /// The protocol path restriction, if this is a path restriction.
    #[must_use]
    pub fn protocol_path(&self) -> Option<&str> {
        match self {
            Self::ProtocolPath(path) => Some(path),
            Self::ContextId(_) => None,
        }
    }
}

/// Conditions a grant invocation must meet, beyond scope.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conditions {
    /// Whether a write invoking this grant must, may, or must not be marked
    /// published. Unset means optional.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication: Option<ConditionPublication>,
}

/// Publication condition attached to a grant.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConditionPublication {
    /// The invoking write must be published.
    #[default]
    Required,
    /// The invoking write must not be published.
    Prohibited,
}
