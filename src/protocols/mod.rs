//! # Protocols
//!
//! Protocol definition structure: the rule-set tree that the protocol
//! authorizer (C6, [`crate::records::Authorizer`]) walks. Installing or
//! replacing a definition (`ProtocolsConfigure` message handling, newest-wins
//! storage) is a method-handler concern and out of scope here; this module
//! only defines the shape and validates it's internally consistent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vercre_infosec::jose::jwk::PublicKeyJwk;

use crate::auth::Authorization;
use crate::{Descriptor, Error, Result};

/// The reserved URI of the first-class permissions protocol (requests,
/// grants, revocations), exempt from requiring a stored `ProtocolsConfigure`.
pub const PROTOCOL_URI: &str = "https://vercre.io/dwn/permissions";

/// Record nesting below a protocol root cannot exceed this many levels.
pub const MAX_NESTING_DEPTH: usize = 10;

/// A `ProtocolsConfigure` message: installs or replaces a protocol
/// definition. Newest-wins arbitration between competing configurations for
/// the same protocol URI (C8, [`crate::ordering`]) and the storage/delete
/// side effects of that arbitration are a method-handler concern; this type
/// only carries the data the protocol authorizer (C6) reads back out of the
/// store.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Configure {
    /// The configure descriptor.
    pub descriptor: ConfigureDescriptor,

    /// The message authorization.
    pub authorization: Authorization,
}

/// `ProtocolsConfigure` descriptor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureDescriptor {
    /// Fields common to every descriptor.
    #[serde(flatten)]
    pub base: Descriptor,

    /// The protocol definition being installed.
    pub definition: Definition,
}

/// A protocol definition: the types a protocol declares and the rule-set
/// tree governing how records of those types may be created and accessed.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    /// The protocol's URI.
    pub protocol: String,

    /// Whether the definition itself may be returned by an unauthorized
    /// `ProtocolsQuery`.
    pub published: bool,

    /// Declared record types.
    pub types: BTreeMap<String, Type>,

    /// The rule-set tree, keyed by type name at each nesting level.
    pub structure: BTreeMap<String, RuleSet>,
}

impl Definition {
    /// Resolve the rule set at `protocol_path` by descending the structure
    /// tree one segment at a time.
    ///
    /// # Errors
    /// Returns [`Error::MissingRuleSet`] if any path segment has no matching
    /// nested rule set.
    pub fn rule_set(&self, protocol_path: &str) -> Result<&RuleSet> {
        let mut segments = protocol_path.split('/');
        let Some(first) = segments.next() else {
            return Err(Error::MissingRuleSet(protocol_path.to_string()));
        };
        let mut rule_set = self
            .structure
            .get(first)
            .ok_or_else(|| Error::MissingRuleSet(protocol_path.to_string()))?;
        for segment in segments {
            rule_set = rule_set
                .nested
                .get(segment)
                .ok_or_else(|| Error::MissingRuleSet(protocol_path.to_string()))?;
        }
        Ok(rule_set)
    }

    /// Every role-marked path in the definition, root-first, used to
    /// validate that an action rule's `role` references a real role record.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSchema`] if nesting exceeds
    /// [`MAX_NESTING_DEPTH`].
    pub fn role_paths(&self) -> Result<Vec<String>> {
        let mut roles = Vec::new();
        for (name, rule_set) in &self.structure {
            role_paths(name, rule_set, &mut roles)?;
        }
        Ok(roles)
    }

    /// Validate the definition's internal consistency: `$size` ranges,
    /// action-rule shape, role references, and nesting depth.
    ///
    /// # Errors
    /// Returns an error naming the first inconsistency found.
    pub fn verify_structure(&self) -> Result<()> {
        let types: Vec<&String> = self.types.keys().collect();
        let roles = self.role_paths()?;
        for rule_set in self.structure.values() {
            verify_rule_set(rule_set, "", &types, &roles)?;
        }
        Ok(())
    }
}

fn role_paths(path: &str, rule_set: &RuleSet, roles: &mut Vec<String>) -> Result<()> {
    if path.split('/').count() > MAX_NESTING_DEPTH {
        return Err(Error::InvalidSchema(format!(
            "record nesting exceeded {MAX_NESTING_DEPTH} levels at {path}"
        )));
    }
    if rule_set.role_scope().is_some() {
        roles.push(path.to_string());
    }
    for (name, nested) in &rule_set.nested {
        let path = format!("{path}/{name}");
        role_paths(&path, nested, roles)?;
    }
    Ok(())
}

fn verify_rule_set(
    rule_set: &RuleSet, protocol_path: &str, types: &[&String], roles: &[String],
) -> Result<()> {
    if let Some(size) = &rule_set.size {
        if let (Some(min), Some(max)) = (size.min, size.max) {
            if min > max {
                return Err(Error::InvalidSchema(format!(
                    "invalid $size range at {protocol_path}"
                )));
            }
        }
    }

    let empty = Vec::new();
    let action_rules = rule_set.actions.as_ref().unwrap_or(&empty);

    for (i, action) in action_rules.iter().enumerate() {
        if let Some(role) = &action.role {
            if !roles.iter().any(|r| r == role) {
                return Err(Error::MissingRole(format!(
                    "action rule at {protocol_path} references undeclared role {role}"
                )));
            }
            let readlike = [Action::Read, Action::Query, Action::Subscribe];
            if !readlike.iter().all(|a| action.can.contains(a)) {
                return Err(Error::ActionNotAllowed(format!(
                    "role {role} action rule at {protocol_path} must grant read, query and subscribe"
                )));
            }
        }

        if action.who == Some(Actor::Anyone) && action.of.is_some() {
            return Err(Error::ActionNotAllowed(format!(
                "`of` must not be set when `who` is anyone at {protocol_path}"
            )));
        }
        if let Some(of) = &action.of {
            if !is_ancestor_path(of, protocol_path) {
                return Err(Error::ActionNotAllowed(format!(
                    "action rule `of` {of} at {protocol_path} does not name an ancestor path"
                )));
            }
        }
        if action.who == Some(Actor::Recipient) && action.of.is_none() {
            let allowed = [Action::CoUpdate, Action::CoDelete, Action::CoPrune];
            if !allowed.iter().any(|a| action.can.contains(a)) {
                return Err(Error::ActionNotAllowed(format!(
                    "recipient action rule with no `of` at {protocol_path} may only grant co-update, co-delete, co-prune"
                )));
            }
        }
        if action.who == Some(Actor::Author) && action.of.is_none() {
            return Err(Error::ActionNotAllowed(format!(
                "`of` must be set when `who` is author at {protocol_path}"
            )));
        }
        if action.can.contains(&Action::Update) && !action.can.contains(&Action::Create) {
            return Err(Error::ActionNotAllowed(format!(
                "action rule granting update without create at {protocol_path}"
            )));
        }
        if action.can.contains(&Action::Delete) && !action.can.contains(&Action::Create) {
            return Err(Error::ActionNotAllowed(format!(
                "action rule granting delete without create at {protocol_path}"
            )));
        }

        for other in &action_rules[i + 1..] {
            let duplicate = if action.who.is_some() {
                action.who == other.who && action.of == other.of
            } else {
                action.role.is_some() && action.role == other.role
            };
            if duplicate {
                return Err(Error::ActionNotAllowed(format!(
                    "more than one action rule for the same actor/role at {protocol_path}"
                )));
            }
        }
    }

    for (name, nested) in &rule_set.nested {
        if !types.iter().any(|t| *t == name) {
            return Err(Error::InvalidType(format!(
                "rule set {name} is not declared as a protocol type"
            )));
        }
        let path =
            if protocol_path.is_empty() { name.clone() } else { format!("{protocol_path}/{name}") };
        verify_rule_set(nested, &path, types, roles)?;
    }

    Ok(())
}

/// `true` if `of` is a strict, segment-wise ancestor of `protocol_path`
/// (e.g. `thread` is an ancestor of `thread/reply` but not of
/// `thread-archive/reply` or of itself).
fn is_ancestor_path(of: &str, protocol_path: &str) -> bool {
    let of_segments: Vec<&str> = of.split('/').collect();
    let path_segments: Vec<&str> = protocol_path.split('/').collect();
    of_segments.len() < path_segments.len() && path_segments[..of_segments.len()] == of_segments[..]
}

/// A record type declared by a protocol definition.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Type {
    /// Schema URI records of this type must conform to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// MIME types records of this type may use; unrestricted if absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_formats: Option<Vec<String>>,
}

/// Scope a `$role`-marked rule set's uniqueness is evaluated over: once
/// globally per protocol instance, or once per enclosing context.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RoleScope {
    /// A recipient may hold this role at most once across the entire
    /// protocol instance (`$globalRole`).
    Global,
    /// A recipient may hold this role at most once per context
    /// (`$contextRole`).
    Context,
}

/// A node in the protocol's rule-set tree, one per record type at a given
/// nesting level.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RuleSet {
    /// Encryption configuration for records at this path.
    #[serde(skip_serializing_if = "Option::is_none", rename = "$encryption")]
    pub encryption: Option<PathEncryption>,

    /// Action rules governing who may act on records at this path.
    #[serde(skip_serializing_if = "Option::is_none", rename = "$actions")]
    pub actions: Option<Vec<ActionRule>>,

    /// Marks this rule set as a global-scope role record (`$globalRole`): a
    /// recipient may hold it at most once across the whole protocol
    /// instance. Mutually exclusive with `context_role`.
    #[serde(skip_serializing_if = "Option::is_none", rename = "$globalRole")]
    pub global_role: Option<bool>,

    /// Marks this rule set as a context-scope role record (`$contextRole`):
    /// a recipient may hold it at most once per enclosing context. Mutually
    /// exclusive with `global_role`.
    #[serde(skip_serializing_if = "Option::is_none", rename = "$contextRole")]
    pub context_role: Option<bool>,

    /// Data size constraint for records at this path.
    #[serde(skip_serializing_if = "Option::is_none", rename = "$size")]
    pub size: Option<SizeRange>,

    /// Tag schema constraints for records at this path.
    #[serde(skip_serializing_if = "Option::is_none", rename = "$tags")]
    pub tags: Option<Tags>,

    /// Nested rule sets, keyed by child type name.
    #[serde(flatten)]
    pub nested: BTreeMap<String, RuleSet>,
}

impl RuleSet {
    /// The role scope this rule set is marked with, if any.
    #[must_use]
    pub fn role_scope(&self) -> Option<RoleScope> {
        if self.global_role.unwrap_or_default() {
            Some(RoleScope::Global)
        } else if self.context_role.unwrap_or_default() {
            Some(RoleScope::Context)
        } else {
            None
        }
    }
}

/// Inclusive byte-size range a record's data must fall within.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct SizeRange {
    /// Minimum allowed size, in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    /// Maximum allowed size, in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

/// Encryption configuration for a protocol path.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathEncryption {
    /// The ID of the root key this path's encryption key is derived from.
    pub root_key_id: String,
    /// Public key used to wrap the symmetric data-encryption key.
    pub public_key_jwk: PublicKeyJwk,
}

/// One rule governing which actors may perform which actions at a protocol
/// path. `who`/`role` are mutually exclusive.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRule {
    /// The actor class this rule grants access to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub who: Option<Actor>,

    /// A role path this rule grants access to instead of an actor class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// The ancestor protocol path `who` is relative to (required for
    /// `author`/`recipient`, forbidden for `anyone`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub of: Option<String>,

    /// The actions this rule grants.
    pub can: Vec<Action>,
}

/// The actor class an [`ActionRule`] grants access to.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Actor {
    /// Any author, authenticated or not.
    #[default]
    Anyone,
    /// The author of the ancestor record named by `of`.
    Author,
    /// The recipient of the ancestor record named by `of`.
    Recipient,
}

/// An action an [`ActionRule`] may grant.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// Create the initial write of a record.
    Create,
    /// Update (rewrite) a record the actor owns.
    Update,
    /// Delete a record the actor owns.
    Delete,
    /// Prune a record (and its descendants) the actor owns.
    Prune,
    /// Query for records.
    Query,
    /// Subscribe to records.
    Subscribe,
    /// Read a record.
    #[default]
    Read,
    /// Update a record as its recipient rather than its author.
    #[serde(rename = "co-update")]
    CoUpdate,
    /// Delete a record as its recipient rather than its author.
    #[serde(rename = "co-delete")]
    CoDelete,
    /// Prune a record as its recipient rather than its author.
    #[serde(rename = "co-prune")]
    CoPrune,
}

/// Tag schema constraints at a protocol path.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tags {
    /// Tags that must be present.
    #[serde(skip_serializing_if = "Option::is_none", rename = "$requiredTags")]
    pub required_tags: Option<Vec<String>>,

    /// Whether tags outside `undefined_tags` are permitted.
    #[serde(skip_serializing_if = "Option::is_none", rename = "$allowUndefinedTags")]
    pub allow_undefined_tags: Option<bool>,

    /// Per-tag JSON-schema fragments.
    #[serde(flatten)]
    pub undefined_tags: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(who: Option<Actor>, of: Option<&str>, can: Vec<Action>) -> ActionRule {
        ActionRule { who, of: of.map(ToString::to_string), can, ..ActionRule::default() }
    }

    fn thread_reply_definition(reply_of: &str) -> Definition {
        let mut definition =
            Definition { protocol: "https://example.com/proto".to_string(), ..Definition::default() };
        definition.types.insert("thread".to_string(), Type::default());
        definition.types.insert("reply".to_string(), Type::default());

        let mut reply = RuleSet::default();
        reply.actions =
            Some(vec![rule(Some(Actor::Author), Some(reply_of), vec![Action::Create])]);

        let mut thread = RuleSet::default();
        thread.nested.insert("reply".to_string(), reply);
        definition.structure.insert("thread".to_string(), thread);
        definition
    }

    #[test]
    fn action_rule_of_must_name_an_ancestor_path() {
        let definition = thread_reply_definition("nonexistent");
        let err = definition.verify_structure().unwrap_err();
        assert!(matches!(err, Error::ActionNotAllowed(_)));
    }

    #[test]
    fn action_rule_of_naming_a_sibling_is_rejected() {
        // `thread-other` shares a prefix character-wise with `thread` but is
        // not a segment-wise ancestor of `thread/reply`.
        let definition = thread_reply_definition("thread-other");
        let err = definition.verify_structure().unwrap_err();
        assert!(matches!(err, Error::ActionNotAllowed(_)));
    }

    #[test]
    fn action_rule_of_naming_a_real_ancestor_is_accepted() {
        let definition = thread_reply_definition("thread");
        definition.verify_structure().unwrap();
    }
}
