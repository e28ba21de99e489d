//! # Protocol Authorizer (C6)
//!
//! The hard core of the authorization pipeline: given a `Records` message
//! that declares a `protocol`, walks the protocol's rule-set tree to decide
//! whether the message's author is allowed to perform the requested action.
//!
//! Entry point is [`Authorizer`], built with the protocol URI and chained
//! through [`Authorizer::verify_integrity`] (steps 1-4 of the rule-set
//! check) and [`Authorizer::permit_write`]/[`Authorizer::permit_delete`]
//! (steps 5-8, the action decision table).

use serde_json::{Map, Value, json};

use crate::context::Context;
use crate::permissions;
use crate::protocols::{Action, Actor, Definition, RoleScope, RuleSet};
use crate::provider::MessageStore;
use crate::records::chain::build_ancestor_chain;
use crate::records::{Delete, RecordsFilter, Write};
use crate::{Error, Method, Result, utils};

/// Walks a protocol's rule-set tree to authorize `Records` operations
/// against it.
pub struct Authorizer<'a> {
    protocol: &'a str,
}

impl<'a> Authorizer<'a> {
    /// Returns a new [`Authorizer`] for `protocol`.
    #[must_use]
    pub const fn new(protocol: &'a str) -> Self {
        Self { protocol }
    }

    /// Verify a write's structural conformance to its protocol rule set:
    /// declared type, schema, data format, protocol-path continuity, role
    /// uniqueness, `$size`, and `$tags` (steps 1-4 and 7 of the rule-set
    /// check).
    ///
    /// # Errors
    /// Returns the specific protocol-authorization error naming the first
    /// check that fails.
    pub async fn verify_integrity(
        &self, owner: &str, write: &Write, store: &impl MessageStore,
    ) -> Result<()> {
        let definition = fetch_definition(owner, self.protocol, store).await?;
        let protocol_path = write
            .descriptor
            .protocol_path
            .as_deref()
            .ok_or_else(|| Error::IncorrectProtocolPath("missing protocol_path".to_string()))?;
        let rule_set = definition.rule_set(protocol_path)?;

        verify_type(write, &definition)?;
        verify_protocol_path(owner, write, store).await?;
        if rule_set.role_scope().is_some() {
            verify_unique_role(owner, write, store).await?;
        }
        verify_size(write.descriptor.data_size, rule_set)?;
        verify_tags(write.descriptor.tags.as_ref(), rule_set)?;

        Ok(())
    }

    /// Authorize a `RecordsWrite` against the protocol's `$actions` rules
    /// (steps 5, 6, 8 of the rule-set check).
    ///
    /// # Errors
    /// [`Error::MissingRole`]/[`Error::NotARole`] if an invoked role doesn't
    /// resolve; [`Error::ActionNotAllowed`] if no rule authorizes the write;
    /// [`Error::InitialWriteAuthorMismatch`] if a rewrite's author doesn't
    /// match the record's initial author.
    pub async fn permit_write(
        &self, ctx: &Context, now: &str, write: &Write, store: &impl MessageStore,
    ) -> Result<()> {
        if write.authorization.owner_jws.is_some() || ctx.is_owner() {
            return Ok(());
        }

        let definition = fetch_definition(&ctx.owner, self.protocol, store).await?;
        let protocol_path = write
            .descriptor
            .protocol_path
            .as_deref()
            .ok_or_else(|| Error::IncorrectProtocolPath("missing protocol_path".to_string()))?;
        let rule_set = definition.rule_set(protocol_path)?;

        let invoked_role = verify_invoked_role(&ctx.owner, write, &definition, store).await?;

        // If this record already has a stored initial write, this inbound
        // message is a rewrite and the chain is rooted through the record
        // itself; otherwise this message is presumed the initial write and
        // the chain is rooted through its declared parent (mirrors the
        // teacher's `permit_write`).
        let stored_initial =
            crate::records::chain::initial_write(&ctx.owner, self.protocol, &write.record_id, store)
                .await?;
        let chain = if stored_initial.is_some() {
            build_ancestor_chain(&ctx.owner, self.protocol, &write.record_id, store).await?
        } else if let Some(parent_id) = &write.descriptor.parent_id {
            build_ancestor_chain(&ctx.owner, self.protocol, parent_id, store).await?
        } else {
            Vec::new()
        };

        if let Some(stored_initial) = &stored_initial {
            let initial_author = stored_initial.authorization.author()?;
            if write.authorization.author()? != initial_author {
                return Err(Error::InitialWriteAuthorMismatch(format!(
                    "rewrite of {} does not match initial author {initial_author}",
                    write.record_id
                )));
            }
        }

        let payload = write.authorization.payload()?;
        if let Some(grant_id) = payload.permission_grant_id {
            let grant = permissions::fetch_grant(&ctx.owner, &grant_id, store).await?;
            permissions::authorize_records(
                ctx,
                &grant,
                now,
                Method::Write,
                self.protocol,
                write.context_id.as_deref(),
                Some(protocol_path),
                store,
            )
            .await?;
            return Ok(());
        }

        let author = write.authorization.author()?;
        for rule in rule_set_actions(rule_set) {
            if !rule.can.contains(&Action::Create) && !rule.can.contains(&Action::Update) {
                continue;
            }
            if let Some(role) = &rule.role {
                if invoked_role.as_deref() == Some(role.as_str()) {
                    return Ok(());
                }
                continue;
            }
            if rule.who == Some(Actor::Anyone) {
                return Ok(());
            }
            if check_actor(&author, rule, &chain)? {
                return Ok(());
            }
        }

        Err(Error::ActionNotAllowed(format!("RecordsWrite by {author} not allowed")))
    }

    /// Authorize a `RecordsDelete` against the protocol's `$actions` rules.
    ///
    /// # Errors
    /// As [`Self::permit_write`].
    pub async fn permit_delete(
        &self, ctx: &Context, now: &str, delete: &Delete, initial_write: &Write,
        store: &impl MessageStore,
    ) -> Result<()> {
        if delete.authorization.owner_jws.is_some() || ctx.is_owner() {
            return Ok(());
        }

        let definition = fetch_definition(&ctx.owner, self.protocol, store).await?;
        let protocol_path = initial_write
            .descriptor
            .protocol_path
            .as_deref()
            .ok_or_else(|| Error::IncorrectProtocolPath("missing protocol_path".to_string()))?;
        let rule_set = definition.rule_set(protocol_path)?;

        let payload = delete.authorization.payload()?;
        if let Some(grant_id) = payload.permission_grant_id {
            let grant = permissions::fetch_grant(&ctx.owner, &grant_id, store).await?;
            permissions::authorize_records(
                ctx,
                &grant,
                now,
                Method::Delete,
                self.protocol,
                initial_write.context_id.as_deref(),
                Some(protocol_path),
                store,
            )
            .await?;
            return Ok(());
        }

        let chain =
            build_ancestor_chain(&ctx.owner, self.protocol, &initial_write.record_id, store).await?;
        let author = delete.authorization.author()?;
        let want = if delete.descriptor.prune {
            [Action::Prune, Action::CoPrune]
        } else {
            [Action::Delete, Action::CoDelete]
        };

        for rule in rule_set_actions(rule_set) {
            if !rule.can.iter().any(|a| want.contains(a)) {
                continue;
            }
            if rule.who == Some(Actor::Anyone) {
                return Ok(());
            }
            if check_actor(&author, rule, &chain)? {
                return Ok(());
            }
        }

        Err(Error::ActionNotAllowed(format!("RecordsDelete by {author} not allowed")))
    }
}

fn rule_set_actions(rule_set: &RuleSet) -> &[crate::protocols::ActionRule] {
    rule_set.actions.as_deref().unwrap_or(&[])
}

fn verify_type(write: &Write, definition: &Definition) -> Result<()> {
    let protocol_path = write.descriptor.protocol_path.as_deref().unwrap_or_default();
    let type_name = protocol_path
        .rsplit('/')
        .next()
        .ok_or_else(|| Error::InvalidType("empty protocol_path".to_string()))?;
    let protocol_type = definition
        .types
        .get(type_name)
        .ok_or_else(|| Error::InvalidType(format!("type {type_name} not declared by protocol")))?;

    if let Some(schema) = &protocol_type.schema {
        if Some(schema) != write.descriptor.schema.as_ref() {
            return Err(Error::InvalidSchema(format!("invalid schema for type {type_name}")));
        }
    }
    if let Some(formats) = &protocol_type.data_formats {
        if !formats.contains(&write.descriptor.data_format) {
            return Err(Error::IncorrectDataFormat(format!(
                "data_format {} not allowed for type {type_name}",
                write.descriptor.data_format
            )));
        }
    }

    Ok(())
}

async fn verify_protocol_path(owner: &str, write: &Write, store: &impl MessageStore) -> Result<()> {
    let protocol_path = write.descriptor.protocol_path.as_deref().unwrap_or_default();
    let type_name = protocol_path.rsplit('/').next().unwrap_or_default();

    let Some(parent_id) = &write.descriptor.parent_id else {
        if protocol_path != type_name {
            return Err(Error::IncorrectProtocolPath(
                "parentless record must have a single-segment protocol_path".to_string(),
            ));
        }
        return Ok(());
    };
    let protocol = write
        .descriptor
        .protocol
        .as_deref()
        .ok_or_else(|| Error::IncorrectProtocolPath("missing protocol".to_string()))?;

    let filter = RecordsFilter::new()
        .record_id(parent_id)
        .protocol(protocol)
        .is_latest_base_state(true);
    let parent = store
        .find(owner, filter)
        .await?
        .iter()
        .find_map(crate::store::Entry::as_write)
        .cloned()
        .ok_or_else(|| Error::AncestorNotFound(parent_id.clone()))?;

    let parent_path = parent.descriptor.protocol_path.as_deref().unwrap_or_default();
    if format!("{parent_path}/{type_name}") != protocol_path {
        return Err(Error::IncorrectProtocolPath(format!(
            "protocol_path {protocol_path} is not a child of {parent_path}"
        )));
    }

    let context_id = write
        .context_id
        .as_deref()
        .ok_or_else(|| Error::IncorrectProtocolPath("missing context_id".to_string()))?;
    let parent_context = parent
        .context_id
        .as_deref()
        .ok_or_else(|| Error::IncorrectProtocolPath("missing parent context_id".to_string()))?;
    if context_id != format!("{parent_context}/{}", write.record_id) {
        return Err(Error::IncorrectProtocolPath(format!(
            "context_id {context_id} is not a child of {parent_context}"
        )));
    }

    Ok(())
}

async fn verify_unique_role(owner: &str, write: &Write, store: &impl MessageStore) -> Result<()> {
    let recipient = write
        .descriptor
        .recipient
        .as_deref()
        .ok_or_else(|| Error::RoleMissingRecipient(write.record_id.clone()))?;
    let protocol = write.descriptor.protocol.as_deref().unwrap_or_default();
    let protocol_path = write.descriptor.protocol_path.as_deref().unwrap_or_default();

    let mut filter = RecordsFilter::new()
        .protocol(protocol)
        .protocol_path(protocol_path)
        .recipient(recipient)
        .is_latest_base_state(true);
    if let Some(context_id) = &write.context_id {
        let context_root = context_id.rsplit_once('/').map_or(context_id.as_str(), |(root, _)| root);
        filter = filter.context_id(context_root);
    }

    for entry in store.find(owner, filter).await? {
        if let Some(matched) = entry.as_write() {
            if matched.record_id != write.record_id {
                return if write.context_id.is_some() {
                    Err(Error::DuplicateRoleRecipientContext(format!(
                        "{recipient} is already the recipient of a role record at {protocol_path}"
                    )))
                } else {
                    Err(Error::DuplicateRoleRecipientGlobal(format!(
                        "{recipient} is already the recipient of a role record at {protocol_path}"
                    )))
                };
            }
        }
    }

    Ok(())
}

/// Returns the protocol role invoked by `write`'s signature payload, having
/// verified the referenced role record exists, if one was invoked.
async fn verify_invoked_role(
    owner: &str, write: &Write, definition: &Definition, store: &impl MessageStore,
) -> Result<Option<String>> {
    let payload = write.authorization.payload()?;
    let Some(protocol_role) = payload.protocol_role else {
        return Ok(None);
    };
    let author = write.authorization.author()?;

    let rule_set = definition.rule_set(&protocol_role)?;
    let Some(scope) = rule_set.role_scope() else {
        return Err(Error::NotARole(protocol_role));
    };

    let protocol = write.descriptor.protocol.as_deref().unwrap_or_default();
    let mut filter = RecordsFilter::new()
        .protocol(protocol)
        .protocol_path(&protocol_role)
        .recipient(&author)
        .is_latest_base_state(true);

    if matches!(scope, RoleScope::Context) {
        let context_id = write
            .context_id
            .as_deref()
            .ok_or_else(|| Error::MissingRole("unable to verify role without context_id".to_string()))?;
        let segment_count = protocol_role.split('/').count();
        let prefix: Vec<&str> = context_id.split('/').take(segment_count).collect();
        filter = filter.context_id(prefix.join("/"));
    }

    if store.find(owner, filter).await?.is_empty() {
        return Err(Error::MissingRole(format!("no role record found for {protocol_role}")));
    }

    Ok(Some(protocol_role))
}

fn verify_size(data_size: u64, rule_set: &RuleSet) -> Result<()> {
    let Some(range) = &rule_set.size else {
        return Ok(());
    };
    if let Some(min) = range.min {
        if data_size < min {
            return Err(Error::InvalidType(format!("data size {data_size} below minimum {min}")));
        }
    }
    if let Some(max) = range.max {
        if data_size > max {
            return Err(Error::InvalidType(format!("data size {data_size} above maximum {max}")));
        }
    }
    Ok(())
}

fn verify_tags(tags: Option<&Map<String, Value>>, rule_set: &RuleSet) -> Result<()> {
    let Some(rule_tags) = &rule_set.tags else {
        return Ok(());
    };

    let schema = json!({
        "type": "object",
        "properties": rule_tags.undefined_tags,
        "required": rule_tags.required_tags.clone().unwrap_or_default(),
        "additionalProperties": rule_tags.allow_undefined_tags.unwrap_or(true),
    });
    let instance = tags.map_or(Value::Object(Map::new()), |t| Value::Object(t.clone()));

    if !jsonschema::is_valid(&schema, &instance) {
        return Err(Error::InvalidType("tags do not match protocol $tags schema".to_string()));
    }

    Ok(())
}

fn check_actor(author: &str, rule: &crate::protocols::ActionRule, chain: &[Write]) -> Result<bool> {
    let Some(of) = &rule.of else {
        return Ok(false);
    };
    let Some(ancestor) = chain.iter().find(|w| w.descriptor.protocol_path.as_deref() == Some(of)) else {
        return Ok(false);
    };

    if rule.who == Some(Actor::Recipient) {
        return Ok(Some(author.to_string()) == ancestor.descriptor.recipient);
    }
    if rule.who == Some(Actor::Author) {
        return Ok(author == ancestor.authorization.author()?);
    }
    Ok(false)
}

async fn fetch_definition(
    owner: &str, protocol_uri: &str, store: &impl MessageStore,
) -> Result<Definition> {
    let protocol_uri = utils::clean_url(protocol_uri);
    if protocol_uri == crate::protocols::PROTOCOL_URI {
        return Ok(permissions_protocol_definition());
    }

    let filter = RecordsFilter::new()
        .interface(crate::Interface::Protocols)
        .method(Method::Configure)
        .protocol(&protocol_uri)
        .is_latest_base_state(true);

    store
        .find(owner, filter)
        .await?
        .iter()
        .find_map(crate::store::Entry::as_configure)
        .map(|configure| configure.descriptor.definition.clone())
        .ok_or(Error::ProtocolDefinitionNotFound(protocol_uri))
}

/// The built-in definition for the reserved permissions protocol.
fn permissions_protocol_definition() -> Definition {
    Definition {
        protocol: crate::protocols::PROTOCOL_URI.to_string(),
        published: false,
        types: std::collections::BTreeMap::new(),
        structure: std::collections::BTreeMap::new(),
    }
}
