//! Shared protocol fixture for the authorization-pipeline integration tests.
//!
//! A small "social" protocol exercising every actor kind the protocol
//! authorizer (C6) supports: an anyone-writable root (`thread`), a child
//! type with both an open create rule and a recipient-of-ancestor rule
//! (`comment`), a context-scoped role (`moderator`), and a role-gated leaf
//! nested under it (`announcement`, at path `thread/moderator/announcement`)
//! — a `$contextRole` only resolves for records at or below its own position
//! in the context tree, so the role-gated type must live under the role.

use std::collections::BTreeMap;

use dwn_node::protocols::{Action, ActionRule, Actor, Definition, RuleSet, Type};

pub const PROTOCOL_URI: &str = "https://example.com/social";

/// A timestamp safely after every fixture message's `2025-01-01` default, for
/// grant `now` comparisons.
pub fn now() -> &'static str {
    "2030-01-01T00:00:00.000000Z"
}

pub fn social_definition() -> Definition {
    let comment = RuleSet {
        actions: Some(vec![
            ActionRule { who: Some(Actor::Anyone), can: vec![Action::Create], ..ActionRule::default() },
            ActionRule {
                who: Some(Actor::Recipient),
                of: Some("thread".to_string()),
                can: vec![Action::CoDelete],
                ..ActionRule::default()
            },
        ]),
        ..RuleSet::default()
    };

    let announcement = RuleSet {
        actions: Some(vec![ActionRule {
            role: Some("thread/moderator".to_string()),
            can: vec![Action::Read, Action::Query, Action::Subscribe, Action::Create],
            ..ActionRule::default()
        }]),
        ..RuleSet::default()
    };

    let mut moderator_nested = BTreeMap::new();
    moderator_nested.insert("announcement".to_string(), announcement);

    // `announcement` is nested under `moderator`, not a sibling of it: a
    // `$contextRole` only resolves for records at or below the role record's
    // own position in the context tree.
    let moderator =
        RuleSet { context_role: Some(true), nested: moderator_nested, ..RuleSet::default() };

    let mut thread_nested = BTreeMap::new();
    thread_nested.insert("comment".to_string(), comment);
    thread_nested.insert("moderator".to_string(), moderator);

    let thread = RuleSet {
        actions: Some(vec![ActionRule { who: Some(Actor::Anyone), can: vec![Action::Create], ..ActionRule::default() }]),
        nested: thread_nested,
        ..RuleSet::default()
    };

    let mut structure = BTreeMap::new();
    structure.insert("thread".to_string(), thread);

    let mut types = BTreeMap::new();
    types.insert("thread".to_string(), Type::default());
    types.insert("comment".to_string(), Type::default());
    types.insert("moderator".to_string(), Type::default());
    types.insert("announcement".to_string(), Type::default());

    Definition { protocol: PROTOCOL_URI.to_string(), published: true, types, structure }
}
