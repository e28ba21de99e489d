//! # Permission grants (C7)
//!
//! Fetching a grant from the store, and the two entry points that check an
//! invoked grant against the message it's meant to authorize: one for the
//! `Messages` interface (arbitrary query/read/subscribe), one for `Records`
//! (read/write). Both share [`verify_base`]'s common validity checks.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};

use crate::permissions::{Conditions, RecordsOptions, Scope};
use crate::protocols::PROTOCOL_URI;
use crate::provider::MessageStore;
use crate::records::{RecordsFilter, Write};
use crate::store::Entry;
use crate::{Context, Error, Interface, Method, Result};

/// A resolved permission grant: the envelope fields (who granted it, to
/// whom, when) plus its [`GrantData`] payload.
#[derive(Clone, Debug)]
pub struct Grant {
    /// The grant's record ID, used as `permissionsGrantId`.
    pub id: String,
    /// The DID that issued the grant.
    pub grantor: String,
    /// The DID the grant was issued to.
    pub grantee: String,
    /// The tenant whose DWN this grant authorizes access to.
    pub granted_for: String,
    /// When the grant was created (ISO-8601 UTC).
    pub date_granted: String,
    /// The grant's scope, conditions, and expiry.
    pub data: GrantData,
}

/// The grant payload, carried as a record's encoded data.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantData {
    /// The tenant whose DWN this grant authorizes access to. Equal to the
    /// grantor for undelegated grants.
    pub granted_for: String,

    /// When the grant expires (ISO-8601 UTC); compared lexicographically.
    pub date_expires: String,

    /// The ID of the `PermissionsRequest` this grant satisfies, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Human-readable description of what the grant is for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `true` if this grant may itself be delegated further.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegated: Option<bool>,

    /// What the grant covers.
    pub scope: Scope,

    /// Conditions a grant invocation must satisfy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,
}

/// Fetch and parse the grant record identified by `grant_id`.
///
/// # Errors
/// Returns [`Error::GrantNotFound`] if no such record exists, or an
/// integrity error if its encoded data doesn't parse as a grant.
pub async fn fetch_grant(owner: &str, grant_id: &str, store: &impl MessageStore) -> Result<Grant> {
    let filter = RecordsFilter::new().record_id(grant_id).protocol(PROTOCOL_URI);
    let entries = store.find(owner, filter).await?;

    let write = entries
        .iter()
        .find_map(crate::store::Entry::as_write)
        .ok_or_else(|| Error::GrantNotFound(grant_id.to_string()))?;

    let encoded = write
        .encoded_data
        .as_ref()
        .ok_or_else(|| Error::GrantNotFound(format!("grant {grant_id} has no data")))?;
    let bytes = Base64UrlUnpadded::decode_vec(encoded).map_err(|e| Error::Collaborator(e.into()))?;
    let data: GrantData = serde_json::from_slice(&bytes).map_err(|e| Error::Collaborator(e.into()))?;

    Ok(Grant {
        id: grant_id.to_string(),
        grantor: write.authorization.author()?,
        grantee: write.descriptor.recipient.clone().unwrap_or_default(),
        granted_for: data.granted_for.clone(),
        date_granted: write.descriptor.date_created.clone(),
        data,
    })
}

/// `true` if a revocation record exists for `grant_id`.
async fn is_revoked(owner: &str, grant_id: &str, store: &impl MessageStore) -> Result<bool> {
    let filter = RecordsFilter::new()
        .protocol(PROTOCOL_URI)
        .protocol_path("revocation")
        .parent_id(grant_id);
    Ok(!store.find(owner, filter).await?.is_empty())
}

/// Common validity checks shared by both grant-authorization entry points.
///
/// # Errors
/// Returns the specific `Grant*` error naming the first check that fails.
async fn verify_base(
    grant: &Grant, expected_grantor: &str, expected_grantee: &str, now: &str,
    interface: Interface, method: Method, owner: &str, store: &impl MessageStore,
) -> Result<()> {
    if grant.grantor != expected_grantor {
        return Err(Error::GrantGrantorMismatch(format!(
            "grant {} was issued by {}, not {expected_grantor}",
            grant.id, grant.grantor
        )));
    }
    if grant.grantee != expected_grantee {
        return Err(Error::GrantGranteeMismatch(format!(
            "grant {} was issued to {}, not {expected_grantee}",
            grant.id, grant.grantee
        )));
    }
    if grant.granted_for != owner {
        return Err(Error::GrantTenantMismatch(format!(
            "grant {} is for tenant {}, not {owner}",
            grant.id, grant.granted_for
        )));
    }
    if now < grant.date_granted.as_str() {
        return Err(Error::GrantNotYetActive(grant.id.clone()));
    }
    if now >= grant.data.date_expires.as_str() {
        return Err(Error::GrantExpired(grant.id.clone()));
    }
    if grant.data.scope.interface() != interface {
        return Err(Error::GrantInterfaceMismatch(format!(
            "grant {} scopes {:?}, inbound is {interface:?}",
            grant.id,
            grant.data.scope.interface()
        )));
    }
    // Records.Write covers both the initial write and subsequent rewrites,
    // both of which carry `Method::Write`, so no further relaxation needed.
    if grant.data.scope.method() != method {
        return Err(Error::GrantMethodMismatch(format!(
            "grant {} scopes {:?}, inbound is {method:?}",
            grant.id,
            grant.data.scope.method()
        )));
    }
    if is_revoked(owner, &grant.id, store).await? {
        return Err(Error::GrantRevoked(grant.id.clone()));
    }

    Ok(())
}

/// Authorize a `Messages`-interface invocation (Query/Subscribe/Read over
/// arbitrary messages) against `grant`. `target` is the message the
/// invocation resolves to: a `ProtocolsConfigure` is checked directly, a
/// `RecordsWrite`/`RecordsDelete` is checked against the protocol it
/// declares, recursing through the reserved permissions protocol's own
/// `scope.protocol` when the target is itself a grant record (mirrors the
/// teacher's `messages::read::verify_scope`).
///
/// # Errors
/// See [`verify_base`]; additionally [`Error::GrantScopeMismatch`] if the
/// grant is protocol-restricted and `target` doesn't resolve to that
/// protocol.
pub async fn authorize_messages(
    ctx: &Context, grant: &Grant, now: &str, method: Method, target: &Entry,
    store: &impl MessageStore,
) -> Result<()> {
    verify_base(grant, &ctx.owner, &ctx.author, now, Interface::Messages, method, &ctx.owner, store)
        .await?;

    if let Some(scoped_protocol) = grant.data.scope.protocol() {
        let resolved = resolve_target_protocol(&ctx.owner, target, store).await?;
        if resolved.as_deref() != Some(scoped_protocol) {
            return Err(Error::GrantScopeMismatch(format!(
                "grant {} is restricted to protocol {scoped_protocol}",
                grant.id
            )));
        }
    }

    Ok(())
}

/// Resolve the protocol a `Messages`-interface target belongs to.
async fn resolve_target_protocol(
    owner: &str, target: &Entry, store: &impl MessageStore,
) -> Result<Option<String>> {
    match target {
        Entry::Configure(configure) => Ok(Some(configure.descriptor.definition.protocol.clone())),
        Entry::Write(write) => Ok(resolve_write_protocol(write)),
        Entry::Delete(delete) => {
            let filter = RecordsFilter::new()
                .record_id(&delete.descriptor.record_id)
                .is_latest_base_state(true);
            let write = store
                .find(owner, filter)
                .await?
                .iter()
                .find_map(crate::store::Entry::as_write)
                .cloned()
                .ok_or_else(|| Error::AncestorNotFound(delete.descriptor.record_id.clone()))?;
            Ok(resolve_write_protocol(&write))
        }
    }
}

/// Resolve a write's own protocol, or — if the write is itself a record of
/// the reserved permissions protocol — the protocol named by its own
/// `scope`, one level of recursion deep (a grant never scopes another
/// grant). A permissions-protocol record that doesn't parse as a grant
/// (e.g. a revocation, which carries no scope) resolves to `None`, which
/// fails the caller's protocol-match comparison rather than silently
/// passing it.
fn resolve_write_protocol(write: &Write) -> Option<String> {
    let protocol = write.descriptor.protocol.as_ref()?;
    if protocol != PROTOCOL_URI {
        return Some(protocol.clone());
    }
    let encoded = write.encoded_data.as_ref()?;
    let bytes = Base64UrlUnpadded::decode_vec(encoded).ok()?;
    let data: GrantData = serde_json::from_slice(&bytes).ok()?;
    data.scope.protocol().map(ToString::to_string)
}

/// Authorize a `Records`-interface invocation (Read/Write) against `grant`.
///
/// # Errors
/// See [`verify_base`]; additionally [`Error::GrantScopeMismatch`] if the
/// message's protocol, context, or protocol path falls outside the grant's
/// restriction.
pub async fn authorize_records(
    ctx: &Context, grant: &Grant, now: &str, method: Method, protocol: &str,
    context_id: Option<&str>, protocol_path: Option<&str>, store: &impl MessageStore,
) -> Result<()> {
    verify_base(grant, &ctx.owner, &ctx.author, now, Interface::Records, method, &ctx.owner, store)
        .await?;

    let Scope::Records { protocol: scoped_protocol, options, .. } = &grant.data.scope else {
        return Err(Error::GrantInterfaceMismatch(format!(
            "grant {} does not carry a Records scope",
            grant.id
        )));
    };
    if scoped_protocol != protocol {
        return Err(Error::GrantScopeMismatch(format!(
            "grant {} is restricted to protocol {scoped_protocol}",
            grant.id
        )));
    }

    match options {
        Some(RecordsOptions::ContextId(scoped)) => {
            if context_id != Some(scoped.as_str()) {
                return Err(Error::GrantScopeMismatch(format!(
                    "grant {} is restricted to context {scoped}",
                    grant.id
                )));
            }
        }
        Some(RecordsOptions::ProtocolPath(scoped)) => {
            if protocol_path != Some(scoped.as_str()) {
                return Err(Error::GrantScopeMismatch(format!(
                    "grant {} is restricted to protocol path {scoped}",
                    grant.id
                )));
            }
        }
        None => {}
    }

    Ok(())
}

/// Builds a grant's [`GrantData`] payload. The grant is then embedded in a
/// `RecordsWrite` at the permissions protocol's `grant` path by whatever
/// message builder the caller uses; constructing that write is a
/// method-handler concern outside this core.
#[derive(Clone, Debug, Default)]
pub struct GrantBuilder {
    granted_for: Option<String>,
    date_expires: Option<String>,
    request_id: Option<String>,
    description: Option<String>,
    delegated: Option<bool>,
    scope: Option<Scope>,
    conditions: Option<Conditions>,
}

impl GrantBuilder {
    /// Returns a new, empty [`GrantBuilder`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tenant whose DWN this grant authorizes access to.
    #[must_use]
    pub fn granted_for(mut self, granted_for: impl Into<String>) -> Self {
        self.granted_for = Some(granted_for.into());
        self
    }

    /// Set the grant's expiry.
    #[must_use]
    pub fn date_expires(mut self, date_expires: impl Into<String>) -> Self {
        self.date_expires = Some(date_expires.into());
        self
    }

    /// Reference the `PermissionsRequest` this grant satisfies.
    #[must_use]
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set a human-readable description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Allow the grantee to delegate this grant further.
    #[must_use]
    pub const fn delegated(mut self, delegated: bool) -> Self {
        self.delegated = Some(delegated);
        self
    }

    /// Set the grant's scope.
    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Set conditions the invocation must satisfy.
    #[must_use]
    pub fn conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Build the [`GrantData`] payload.
    ///
    /// # Errors
    /// Returns an error if `granted_for`, `scope`, or `date_expires` were not
    /// set.
    pub fn build(self) -> Result<GrantData> {
        Ok(GrantData {
            granted_for: self
                .granted_for
                .ok_or_else(|| crate::unexpected!("granted_for not set on GrantBuilder"))?,
            date_expires: self
                .date_expires
                .ok_or_else(|| crate::unexpected!("date_expires not set on GrantBuilder"))?,
            request_id: self.request_id,
            description: self.description,
            delegated: self.delegated,
            scope: self.scope.ok_or_else(|| crate::unexpected!("scope not set on GrantBuilder"))?,
            conditions: self.conditions,
        })
    }
}
