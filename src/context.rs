//! # Context
//!
//! A small bundle threaded through the authorization pipeline so call sites
//! don't re-derive the owner/author pair repeatedly. Mirrors the
//! `ctx: &Context` parameter the teacher's protocol-configure handler takes.
//! An invoked grant, if any, is looked up and passed alongside `Context`
//! (see `permissions::authorize_records`/`authorize_messages`) rather than
//! carried on it, since the grant is specific to one message's authorization
//! check, not the request as a whole.

/// Per-request authorization context.
#[derive(Clone, Debug)]
pub struct Context {
    /// The tenant DID that owns the targeted DWN instance.
    pub owner: String,

    /// The DID that signed the inbound message.
    pub author: String,
}

impl Context {
    /// Create a new context for a message.
    #[must_use]
    pub fn new(owner: impl Into<String>, author: impl Into<String>) -> Self {
        Self { owner: owner.into(), author: author.into() }
    }

    /// `true` when the author is the tenant itself (the canonical,
    /// owner-only authorization shortcut, C4).
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.author == self.owner
    }
}
