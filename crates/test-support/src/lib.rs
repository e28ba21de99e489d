#![allow(missing_docs)]

//! # Test fixtures
//!
//! An in-memory [`MessageStore`] and deterministic [`TestSigner`]/
//! [`TestResolver`] pair, used by the authorization core's own test suite
//! and available to downstream handler crates that want to exercise it
//! without standing up a real store or DID network.
//!
//! Grounded in the shape of the teacher's `ProviderImpl` test fixture
//! (`crates/test-utils/src/store.rs`): a struct implementing the provider
//! traits, with a companion keyring for signing. The persistence mechanism
//! itself is swapped for a plain in-memory vector since this crate has no
//! SQL-backed store of its own to match against.

use std::collections::HashMap;
use std::sync::Arc;

pub mod fixture;

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use dwn_node::provider::{DidResolver, Document, MessageStore, Signer, VerificationMethod};
use dwn_node::store::{Entry, RecordsFilter, RecordsQuery};
use dwn_node::{Result, ordering};
use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;
use tokio::sync::Mutex;
use vercre_infosec::jose::jwk::{Curve, KeyType, PublicKeyJwk};

/// A deterministic Ed25519 signer for a fixed DID, for use in tests that
/// need to build and authorize messages end to end.
pub struct TestSigner {
    did: String,
    signing_key: SigningKey,
}

impl TestSigner {
    /// Generate a new signer for `did`, with a fresh random keypair.
    #[must_use]
    pub fn new(did: impl Into<String>) -> Self {
        Self { did: did.into(), signing_key: SigningKey::generate(&mut OsRng) }
    }

    /// This signer's DID.
    #[must_use]
    pub fn did(&self) -> &str {
        &self.did
    }

    /// The fully-qualified key ID this signer signs with.
    #[must_use]
    pub fn key_id(&self) -> String {
        format!("{}#key-1", self.did)
    }

    /// This signer's public key, as a JWK, for registering with a
    /// [`TestResolver`].
    #[must_use]
    pub fn public_key_jwk(&self) -> PublicKeyJwk {
        let verifying_key = self.signing_key.verifying_key();
        PublicKeyJwk {
            kty: KeyType::Okp,
            crv: Curve::Ed25519,
            x: Base64UrlUnpadded::encode_string(verifying_key.as_bytes()),
            ..PublicKeyJwk::default()
        }
    }
}

#[async_trait]
impl Signer for TestSigner {
    async fn try_sign(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(self.signing_key.sign(data).to_bytes().to_vec())
    }

    async fn verification_method(&self) -> anyhow::Result<String> {
        Ok(self.key_id())
    }
}

/// A fixed-population DID resolver: every [`TestSigner`] used in a test is
/// [`TestResolver::register`]ed so its signatures can be authenticated (C3)
/// without a real DID network round trip.
#[derive(Clone, Default)]
pub struct TestResolver {
    documents: HashMap<String, Document>,
}

impl TestResolver {
    /// Returns a new, empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `signer`'s DID document so it resolves.
    pub fn register(&mut self, signer: &TestSigner) {
        let document = Document {
            id: signer.did().to_string(),
            verification_method: vec![VerificationMethod {
                id: signer.key_id(),
                public_key_jwk: signer.public_key_jwk(),
            }],
        };
        self.documents.insert(signer.did().to_string(), document);
    }

    /// Build a resolver pre-populated with `signers`.
    #[must_use]
    pub fn with_signers(signers: &[&TestSigner]) -> Self {
        let mut resolver = Self::new();
        for signer in signers {
            resolver.register(signer);
        }
        resolver
    }
}

#[async_trait]
impl DidResolver for TestResolver {
    async fn resolve(&self, did: &str) -> anyhow::Result<Document> {
        self.documents
            .get(did)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("DID not found in test resolver: {did}"))
    }
}

/// An in-memory [`MessageStore`], one `Vec<Entry>` per tenant.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tenants: Arc<Mutex<HashMap<String, Vec<Entry>>>>,
}

impl MemoryStore {
    /// Returns a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn put(&self, owner: &str, entry: &Entry) -> Result<()> {
        let mut tenants = self.tenants.lock().await;
        tenants.entry(owner.to_string()).or_default().push(entry.clone());
        Ok(())
    }

    async fn get(&self, owner: &str, message_cid: &str) -> Result<Option<Entry>> {
        let tenants = self.tenants.lock().await;
        let Some(entries) = tenants.get(owner) else {
            return Ok(None);
        };
        for entry in entries {
            if entry.cid()? == message_cid {
                return Ok(Some(entry.clone()));
            }
        }
        Ok(None)
    }

    async fn query(&self, owner: &str, query: &RecordsQuery) -> Result<Vec<Entry>> {
        let tenants = self.tenants.lock().await;
        let Some(entries) = tenants.get(owner) else {
            return Ok(Vec::new());
        };

        let mut by_cid: HashMap<String, Entry> = HashMap::new();
        for filter in &query.filters {
            for entry in find_by_filter(entries, filter)? {
                by_cid.insert(entry.cid()?, entry);
            }
        }
        Ok(by_cid.into_values().collect())
    }

    async fn delete(&self, owner: &str, message_cid: &str) -> Result<()> {
        let mut tenants = self.tenants.lock().await;
        if let Some(entries) = tenants.get_mut(owner) {
            let mut kept = Vec::with_capacity(entries.len());
            for entry in entries.drain(..) {
                if entry.cid()? != message_cid {
                    kept.push(entry);
                }
            }
            *entries = kept;
        }
        Ok(())
    }
}

fn find_by_filter(entries: &[Entry], filter: &RecordsFilter) -> Result<Vec<Entry>> {
    let mut matched: Vec<Entry> =
        entries.iter().filter(|entry| matches_filter(filter, entry)).cloned().collect();

    if filter.is_latest_base_state == Some(true) {
        matched = latest_per_group(matched)?;
    }
    Ok(matched)
}

/// Each entry's grouping key for "latest wins" arbitration (C8): a record's
/// own ID for writes/deletes, the protocol URI for protocol configurations.
fn group_key(entry: &Entry) -> String {
    match entry {
        Entry::Write(write) => write.record_id.clone(),
        Entry::Delete(delete) => delete.descriptor.record_id.clone(),
        Entry::Configure(configure) => configure.descriptor.definition.protocol.clone(),
    }
}

fn latest_per_group(entries: Vec<Entry>) -> Result<Vec<Entry>> {
    let mut groups: HashMap<String, Entry> = HashMap::new();
    for entry in entries {
        let key = group_key(&entry);
        match groups.remove(&key) {
            Some(current) => {
                let winner = if ordering::compare_entries(&entry, &current)? == std::cmp::Ordering::Greater
                {
                    entry
                } else {
                    current
                };
                groups.insert(key, winner);
            }
            None => {
                groups.insert(key, entry);
            }
        }
    }
    Ok(groups.into_values().collect())
}

#[allow(clippy::too_many_lines)]
fn matches_filter(filter: &RecordsFilter, entry: &Entry) -> bool {
    let descriptor = entry.descriptor();
    if let Some(interface) = &filter.interface {
        if &descriptor.interface != interface {
            return false;
        }
    }
    if let Some(method) = &filter.method {
        if &descriptor.method != method {
            return false;
        }
    }
    if let Some(range) = &filter.date_created {
        let Ok(timestamp) = chrono::DateTime::parse_from_rfc3339(&descriptor.message_timestamp)
        else {
            return false;
        };
        if !range.contains(&timestamp.with_timezone(&chrono::Utc)) {
            return false;
        }
    }

    match entry {
        Entry::Write(write) => {
            if let Some(record_id) = &filter.record_id {
                if &write.record_id != record_id {
                    return false;
                }
            }
            if let Some(author) = &filter.author {
                let Ok(actual) = write.authorization.author() else { return false };
                if !author.contains(&actual) {
                    return false;
                }
            }
            if let Some(recipient) = &filter.recipient {
                let Some(actual) = &write.descriptor.recipient else { return false };
                if !recipient.contains(actual) {
                    return false;
                }
            }
            if let Some(context_id) = &filter.context_id {
                // A context filter matches the named context and everything
                // nested under it, mirroring the range query (`contextId
                // BETWEEN prefix AND prefix+'￿'`) the teacher's
                // SurrealDB-backed store builds for the same lookup.
                let Some(actual) = &write.context_id else { return false };
                if actual != context_id && !actual.starts_with(&format!("{context_id}/")) {
                    return false;
                }
            }
            if let Some(parent_id) = &filter.parent_id {
                if write.descriptor.parent_id.as_ref() != Some(parent_id) {
                    return false;
                }
            }
            if let Some(protocol) = &filter.protocol {
                if write.descriptor.protocol.as_ref() != Some(protocol) {
                    return false;
                }
            }
            if let Some(protocol_path) = &filter.protocol_path {
                if write.descriptor.protocol_path.as_ref() != Some(protocol_path) {
                    return false;
                }
            }
            if let Some(schema) = &filter.schema {
                if write.descriptor.schema.as_ref() != Some(schema) {
                    return false;
                }
            }
            if let Some(data_format) = &filter.data_format {
                if &write.descriptor.data_format != data_format {
                    return false;
                }
            }
            if let Some(data_cid) = &filter.data_cid {
                if &write.descriptor.data_cid != data_cid {
                    return false;
                }
            }
            if let Some(published) = &filter.published {
                if write.descriptor.published.unwrap_or(false) != *published {
                    return false;
                }
            }
            true
        }
        Entry::Delete(delete) => {
            if let Some(record_id) = &filter.record_id {
                if &delete.descriptor.record_id != record_id {
                    return false;
                }
            }
            // A delete has no protocol/recipient/schema fields of its own;
            // a filter naming one of those never matches a delete entry.
            filter.recipient.is_none()
                && filter.context_id.is_none()
                && filter.protocol.is_none()
                && filter.protocol_path.is_none()
                && filter.schema.is_none()
                && filter.data_format.is_none()
                && filter.data_cid.is_none()
                && filter.published.is_none()
                && (filter.author.is_none()
                    || delete
                        .authorization
                        .author()
                        .is_ok_and(|actual| filter.author.as_ref().is_some_and(|a| a.contains(&actual))))
        }
        Entry::Configure(configure) => {
            if let Some(protocol) = &filter.protocol {
                if &configure.descriptor.definition.protocol != protocol {
                    return false;
                }
            }
            filter.record_id.is_none()
                && filter.recipient.is_none()
                && filter.context_id.is_none()
                && filter.parent_id.is_none()
                && filter.protocol_path.is_none()
                && filter.schema.is_none()
                && filter.data_format.is_none()
                && filter.data_cid.is_none()
                && filter.published.is_none()
                && (filter.author.is_none()
                    || configure
                        .authorization
                        .author()
                        .is_ok_and(|actual| filter.author.as_ref().is_some_and(|a| a.contains(&actual))))
        }
    }
}
