//! # Provider
//!
//! Traits the authorization core consumes from its external collaborators.
//! Implementations (a persistent message store, a DID resolver, a signer)
//! are out of scope for this crate; [`crate::cid`]/[`crate::auth`]/
//! [`crate::records`]/[`crate::protocols`]/[`crate::permissions`] depend only
//! on these trait boundaries.

use async_trait::async_trait;
use vercre_infosec::jose::jwk::PublicKeyJwk;

use crate::Result;
use crate::store::{Entry, RecordsFilter, RecordsQuery};

/// The `MessageStore` trait is used by implementers to provide message
/// storage capability. Narrowed to the operations the authorization core
/// itself calls — a handler's persistence layer may expose more.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store a message, indexed for later retrieval by [`Self::query`].
    async fn put(&self, owner: &str, entry: &Entry) -> Result<()>;

    /// Fetch a single message by CID, returning `None` if absent.
    async fn get(&self, owner: &str, message_cid: &str) -> Result<Option<Entry>>;

    /// Fetch every message matching `query`.
    async fn query(&self, owner: &str, query: &RecordsQuery) -> Result<Vec<Entry>>;

    /// Fetch every message matching a single [`RecordsFilter`], a
    /// convenience over [`Self::query`] used throughout the authorizers.
    async fn find(&self, owner: &str, filter: RecordsFilter) -> Result<Vec<Entry>> {
        self.query(owner, &RecordsQuery::new().add_filter(filter)).await
    }

    /// Delete the message associated with the given CID.
    async fn delete(&self, owner: &str, message_cid: &str) -> Result<()>;
}

/// A DID document's verification method: a named public key.
#[derive(Clone, Debug)]
pub struct VerificationMethod {
    /// Fully-qualified key ID, e.g. `did:example:123#key-1`.
    pub id: String,

    /// The `JsonWebKey2020` public key material.
    pub public_key_jwk: PublicKeyJwk,
}

/// A resolved DID document, narrowed to what signature verification needs.
#[derive(Clone, Debug, Default)]
pub struct Document {
    /// The DID this document describes.
    pub id: String,

    /// The document's verification methods.
    pub verification_method: Vec<VerificationMethod>,
}

impl Document {
    /// Look up a verification method's public key by its fully-qualified ID.
    #[must_use]
    pub fn verification_method(&self, kid: &str) -> Option<PublicKeyJwk> {
        self.verification_method
            .iter()
            .find(|vm| vm.id == kid)
            .map(|vm| vm.public_key_jwk.clone())
    }
}

/// DID resolution, consumed by the authenticator (C3) to fetch signer keys.
#[async_trait]
pub trait DidResolver: Send + Sync {
    /// Resolve a DID to its document.
    ///
    /// # Errors
    /// Returns an error if the DID cannot be resolved.
    async fn resolve(&self, did: &str) -> anyhow::Result<Document>;
}

/// Digital signing, consumed only by test fixtures and message builders (the
/// authorization core itself only verifies, it never signs).
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign `data`, returning the raw signature bytes.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    async fn try_sign(&self, data: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// The fully-qualified key ID (`kid`) this signer signs with.
    ///
    /// # Errors
    /// Returns an error if the signer has no associated key ID.
    async fn verification_method(&self) -> anyhow::Result<String>;
}
