//! # Authorization
//!
//! Signature integrity validation (C2) and cryptographic authentication
//! (C3). An [`Authorization`] wraps the generalized JWS a message carries;
//! [`Authorization::payload`] only returns a value once the envelope's
//! structure and the descriptor CID it commits to have both been checked.

mod jws;

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};

pub use self::jws::{Jws, JwsBuilder, Signature};
use crate::provider::{DidResolver, Signer};
use crate::records::DelegatedGrant;
use crate::{Error, Result};

/// Payload carried inside a message's authorization JWS. Every message
/// carries `descriptor_cid`; the remaining fields are populated only by the
/// message kinds that need them (§4.2's "payload allow-list").
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePayload {
    /// CID of the message descriptor this authorization covers.
    pub descriptor_cid: String,

    /// Record ID, required for `Records` messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,

    /// Context ID, present for protocol-context records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// The role path invoked by this message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_role: Option<String>,

    /// Permission grant invoked by this message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_grant_id: Option<String>,

    /// CID of an attached attestation JWS, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation_cid: Option<String>,

    /// CID of an attached encryption property, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_cid: Option<String>,
}

/// Which extra `SignaturePayload` properties a given message kind may carry,
/// and which of those must themselves parse as CIDs. Modeled as a config
/// struct per `SPEC_FULL.md` §4.2's note to avoid dynamic property maps.
#[derive(Clone, Copy, Debug, Default)]
pub struct PayloadAllowList {
    /// `recordId` is a legal (and for Records messages, required) property.
    pub record_id: bool,
    /// `contextId` is a legal property.
    pub context_id: bool,
    /// `protocolRole` is a legal property.
    pub protocol_role: bool,
    /// `permissionsGrantId` is a legal property.
    pub permission_grant_id: bool,
    /// `attestationCid` is a legal property, and must parse as a CID.
    pub attestation_cid: bool,
    /// `encryptionCid` is a legal property, and must parse as a CID.
    pub encryption_cid: bool,
}

impl PayloadAllowList {
    /// Allow-list for a `Records` write/delete: everything but attestation
    /// and encryption, which only writes carry.
    #[must_use]
    pub const fn records() -> Self {
        Self {
            record_id: true,
            context_id: true,
            protocol_role: true,
            permission_grant_id: true,
            attestation_cid: true,
            encryption_cid: true,
        }
    }

    /// Allow-list for a generic (non-`Records`) message: only the
    /// permission grant and role properties apply.
    #[must_use]
    pub const fn generic() -> Self {
        Self {
            record_id: false,
            context_id: false,
            protocol_role: true,
            permission_grant_id: true,
            attestation_cid: false,
            encryption_cid: false,
        }
    }
}

/// A message's authorization: author signature plus, for owner-initiated
/// writes on another author's record, an owner signature.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Authorization {
    /// Author signature over [`SignaturePayload`].
    #[serde(flatten)]
    pub jws: Jws,

    /// Owner signature, present when the tenant countersigns a message it
    /// did not author (e.g. accepting custody of another author's write).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_jws: Option<Jws>,

    /// The delegated grant invoked to sign on behalf of the logical author,
    /// present when a delegate rather than the grantor itself signed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_delegated_grant: Option<DelegatedGrant>,
}

impl Authorization {
    /// Validate envelope structure and that the payload's `descriptorCid`
    /// matches the recomputed descriptor CID (C2). Does not verify any
    /// cryptographic signature.
    ///
    /// # Errors
    /// Returns an `Integrity`-category [`Error`] on any structural mismatch.
    pub fn validate_integrity(
        &self, descriptor_cid: &str, allow: PayloadAllowList,
    ) -> Result<SignaturePayload> {
        if self.jws.signatures.len() != 1 {
            return Err(Error::SignatureCountInvalid(format!(
                "expected exactly one author signature, found {}",
                self.jws.signatures.len()
            )));
        }
        if let Some(owner_jws) = &self.owner_jws {
            if owner_jws.signatures.len() != 1 {
                return Err(Error::SignatureCountInvalid(
                    "expected exactly one owner signature".to_string(),
                ));
            }
        }

        let payload_bytes = Base64UrlUnpadded::decode_vec(&self.jws.payload)
            .map_err(|e| Error::AuthorizationMissing(format!("invalid payload encoding: {e}")))?;
        let payload: SignaturePayload = serde_json::from_slice(&payload_bytes)
            .map_err(|e| Error::PayloadSchemaInvalid(e.to_string()))?;

        if payload.descriptor_cid != descriptor_cid {
            return Err(Error::DescriptorCidMismatch(format!(
                "expected {descriptor_cid}, found {}",
                payload.descriptor_cid
            )));
        }

        if payload.record_id.is_some() && !allow.record_id {
            return Err(Error::PayloadExtraneousProperty("recordId".to_string()));
        }
        if payload.context_id.is_some() && !allow.context_id {
            return Err(Error::PayloadExtraneousProperty("contextId".to_string()));
        }
        if payload.protocol_role.is_some() && !allow.protocol_role {
            return Err(Error::PayloadExtraneousProperty("protocolRole".to_string()));
        }
        if payload.permission_grant_id.is_some() && !allow.permission_grant_id {
            return Err(Error::PayloadExtraneousProperty("permissionsGrantId".to_string()));
        }
        if let Some(cid) = &payload.attestation_cid {
            if !allow.attestation_cid {
                return Err(Error::PayloadExtraneousProperty("attestationCid".to_string()));
            }
            crate::cid::parse(cid).map_err(|_| Error::PayloadPropertyNotCid(cid.clone()))?;
        }
        if let Some(cid) = &payload.encryption_cid {
            if !allow.encryption_cid {
                return Err(Error::PayloadExtraneousProperty("encryptionCid".to_string()));
            }
            crate::cid::parse(cid).map_err(|_| Error::PayloadPropertyNotCid(cid.clone()))?;
        }

        Ok(payload)
    }

    /// Decode the signature payload without re-validating its structure or
    /// descriptor CID, for callers that already ran
    /// [`Self::validate_integrity`] and only need a field off the payload
    /// (e.g. `protocol_role`, `permission_grant_id`).
    ///
    /// # Errors
    /// Returns an error if the payload is not validly base64url-encoded
    /// JSON.
    pub fn payload(&self) -> Result<SignaturePayload> {
        let bytes = Base64UrlUnpadded::decode_vec(&self.jws.payload)
            .map_err(|e| Error::AuthorizationMissing(format!("invalid payload encoding: {e}")))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::PayloadSchemaInvalid(e.to_string()))
    }

    /// The DID that authored (signed) the message.
    ///
    /// # Errors
    /// Returns an error if the author signature's protected header is
    /// malformed or carries no `kid`.
    pub fn author(&self) -> Result<String> {
        self.jws.signer_did()
    }

    /// The DID that countersigned as owner, if any.
    ///
    /// # Errors
    /// Returns an error if present but the header is malformed.
    pub fn owner(&self) -> Result<Option<String>> {
        self.owner_jws.as_ref().map(jws::Jws::signer_did).transpose()
    }

    /// Cryptographically authenticate every signature present, resolving
    /// each signer's key via `resolver` (C3).
    ///
    /// # Errors
    /// Returns [`Error::AuthenticateSignerNotFound`] if the DID resolves to
    /// no matching key, or [`Error::AuthenticateSignatureInvalid`] if
    /// verification fails.
    pub async fn authenticate(&self, resolver: &impl DidResolver) -> Result<()> {
        self.jws.verify(resolver).await?;
        if let Some(owner_jws) = &self.owner_jws {
            owner_jws.verify(resolver).await?;
        }
        Ok(())
    }

    /// Convenience: validate integrity then authenticate in one call.
    ///
    /// # Errors
    /// See [`Self::validate_integrity`] and [`Self::authenticate`].
    pub async fn verify(
        &self, descriptor_cid: &str, allow: PayloadAllowList, resolver: &impl DidResolver,
    ) -> Result<SignaturePayload> {
        let payload = self.validate_integrity(descriptor_cid, allow)?;
        self.authenticate(resolver).await?;
        Ok(payload)
    }
}

/// Builds an [`Authorization`] over a descriptor CID.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationBuilder {
    descriptor_cid: Option<String>,
    record_id: Option<String>,
    context_id: Option<String>,
    protocol_role: Option<String>,
    permission_grant_id: Option<String>,
    delegated_grant: Option<DelegatedGrant>,
}

impl AuthorizationBuilder {
    /// Returns a new [`AuthorizationBuilder`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CID of the descriptor being authorized.
    #[must_use]
    pub fn descriptor_cid(mut self, cid: impl Into<String>) -> Self {
        self.descriptor_cid = Some(cid.into());
        self
    }

    /// Set the record ID, for `Records` messages.
    #[must_use]
    pub fn record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    /// Set the context ID, for protocol-context records.
    #[must_use]
    pub fn context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Invoke a protocol role.
    #[must_use]
    pub fn protocol_role(mut self, role: impl Into<String>) -> Self {
        self.protocol_role = Some(role.into());
        self
    }

    /// Invoke a permission grant.
    #[must_use]
    pub fn permission_grant_id(mut self, id: impl Into<String>) -> Self {
        self.permission_grant_id = Some(id.into());
        self
    }

    /// Sign on behalf of a grantor via a delegated grant.
    #[must_use]
    pub fn delegated_grant(mut self, grant: DelegatedGrant) -> Self {
        self.delegated_grant = Some(grant);
        self
    }

    /// Sign and build the [`Authorization`].
    ///
    /// # Errors
    /// Returns an error if the descriptor CID was not set or signing fails.
    pub async fn build(self, signer: &impl Signer) -> Result<Authorization> {
        let descriptor_cid = self
            .descriptor_cid
            .ok_or_else(|| crate::unexpected!("descriptor_cid not set on AuthorizationBuilder"))?;

        let payload = SignaturePayload {
            descriptor_cid,
            record_id: self.record_id,
            context_id: self.context_id,
            protocol_role: self.protocol_role,
            permission_grant_id: self.permission_grant_id,
            attestation_cid: None,
            encryption_cid: None,
        };

        let jws = JwsBuilder::new(&payload).build(signer).await?;

        Ok(Authorization {
            jws,
            owner_jws: None,
            author_delegated_grant: self.delegated_grant,
        })
    }
}

#[cfg(test)]
mod tests {
    use test_support::{TestResolver, TestSigner};

    use super::*;

    #[tokio::test]
    async fn verify_accepts_a_correctly_signed_payload() {
        let alice = TestSigner::new("did:example:alice");
        let resolver = TestResolver::with_signers(&[&alice]);

        let authorization =
            AuthorizationBuilder::new().descriptor_cid("bafy_descriptor").build(&alice).await.unwrap();

        authorization.verify("bafy_descriptor", PayloadAllowList::generic(), &resolver).await.unwrap();
    }

    #[tokio::test]
    async fn verify_rejects_a_mismatched_descriptor_cid() {
        let alice = TestSigner::new("did:example:alice");
        let resolver = TestResolver::with_signers(&[&alice]);

        // Signed over one descriptor CID, checked against another: the
        // payload's committed CID no longer matches what the caller
        // recomputed from the actual descriptor.
        let authorization =
            AuthorizationBuilder::new().descriptor_cid("bafy_original").build(&alice).await.unwrap();

        let err = authorization
            .verify("bafy_tampered", PayloadAllowList::generic(), &resolver)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DescriptorCidMismatch(_)));
    }

    #[tokio::test]
    async fn verify_rejects_an_unresolvable_signer() {
        let alice = TestSigner::new("did:example:alice");
        // Resolver knows no keys at all: alice's signature can't be checked.
        let resolver = TestResolver::with_signers(&[]);

        let authorization =
            AuthorizationBuilder::new().descriptor_cid("bafy_descriptor").build(&alice).await.unwrap();

        let err = authorization
            .verify("bafy_descriptor", PayloadAllowList::generic(), &resolver)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticateSignerNotFound(_)));
    }

    #[tokio::test]
    async fn validate_integrity_rejects_a_disallowed_property() {
        let alice = TestSigner::new("did:example:alice");
        // `generic()`'s allow-list disallows `contextId`, which only
        // `Records` messages may carry.
        let authorization = AuthorizationBuilder::new()
            .descriptor_cid("bafy_descriptor")
            .context_id("some/context")
            .build(&alice)
            .await
            .unwrap();

        let err = authorization
            .validate_integrity("bafy_descriptor", PayloadAllowList::generic())
            .unwrap_err();
        assert!(matches!(err, Error::PayloadExtraneousProperty(_)));
    }
}
