//! # General JWS
//!
//! A minimal JSON Web Signature (general serialization) type covering
//! exactly what the authorization pipeline needs: one or more detached
//! signatures over a base64url payload, each with a protected header naming
//! the signing key.

use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use vercre_infosec::jose::jwk::PublicKeyJwk;

use crate::provider::{DidResolver, Signer};
use crate::{Error, Result};

/// A JWS protected header.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Header {
    /// Signature algorithm, e.g. `"EdDSA"`.
    pub alg: String,

    /// Fully-qualified key ID (`did:...#key`) of the signing key.
    pub kid: String,
}

/// One signature entry in a general JWS.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Signature {
    /// Base64url-encoded, JSON-serialized [`Header`].
    pub protected: String,

    /// Base64url-encoded signature bytes.
    pub signature: String,
}

impl Signature {
    fn header(&self) -> Result<Header> {
        let bytes = Base64UrlUnpadded::decode_vec(&self.protected)
            .map_err(|e| Error::AuthenticateSignerNotFound(format!("bad protected header: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::AuthenticateSignerNotFound(format!("bad protected header: {e}")))
    }
}

/// A JWS in general (non-flattened) serialization, restricted to exactly
/// the fields the authorization pipeline consumes.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Jws {
    /// Base64url-encoded JSON payload.
    pub payload: String,

    /// One signature per signer.
    pub signatures: Vec<Signature>,
}

impl Jws {
    /// The DID of the (first, and expected-only) signer.
    pub(crate) fn signer_did(&self) -> Result<String> {
        let sig = self
            .signatures
            .first()
            .ok_or_else(|| Error::AuthorizationMissing("no signatures present".to_string()))?;
        let header = sig.header()?;
        did_from_kid(&header.kid)
    }

    /// Verify every signature against a key resolved via `resolver` (C3).
    ///
    /// # Errors
    /// [`Error::AuthenticateSignerNotFound`] if the DID document carries no
    /// matching verification method; [`Error::AuthenticateAlgorithmUnsupported`]
    /// for an unrecognized `alg`; [`Error::AuthenticateSignatureInvalid`] if
    /// cryptographic verification fails.
    pub async fn verify(&self, resolver: &impl DidResolver) -> Result<()> {
        for sig in &self.signatures {
            let header = sig.header()?;
            if header.alg != "EdDSA" {
                return Err(Error::AuthenticateAlgorithmUnsupported(header.alg.clone()));
            }

            let did = did_from_kid(&header.kid)?;
            let document = resolver
                .resolve(&did)
                .await
                .map_err(|e| Error::AuthenticateSignerNotFound(format!("{did}: {e}")))?;
            let jwk = document
                .verification_method(&header.kid)
                .ok_or_else(|| Error::AuthenticateSignerNotFound(header.kid.clone()))?;

            let verifying_key = verifying_key(&jwk)?;
            let signing_input = format!("{}.{}", sig.protected, self.payload);
            let sig_bytes = Base64UrlUnpadded::decode_vec(&sig.signature).map_err(|e| {
                Error::AuthenticateSignatureInvalid(format!("bad signature encoding: {e}"))
            })?;
            let signature = Ed25519Signature::from_slice(&sig_bytes).map_err(|e| {
                Error::AuthenticateSignatureInvalid(format!("malformed signature: {e}"))
            })?;

            verifying_key
                .verify(signing_input.as_bytes(), &signature)
                .map_err(|e| Error::AuthenticateSignatureInvalid(e.to_string()))?;
        }

        Ok(())
    }
}

/// `did:example:123#key-1` -> `did:example:123`.
fn did_from_kid(kid: &str) -> Result<String> {
    kid.split_once('#')
        .map(|(did, _)| did.to_string())
        .ok_or_else(|| Error::AuthenticateSignerNotFound(format!("malformed kid: {kid}")))
}

fn verifying_key(jwk: &PublicKeyJwk) -> Result<VerifyingKey> {
    let x = jwk
        .x()
        .ok_or_else(|| Error::AuthenticateSignerNotFound("key missing `x` coordinate".to_string()))?;
    let bytes = Base64UrlUnpadded::decode_vec(x)
        .map_err(|e| Error::AuthenticateSignerNotFound(format!("bad key encoding: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::AuthenticateSignerNotFound("key is not 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| Error::AuthenticateSignerNotFound(format!("invalid key: {e}")))
}

/// Builds a [`Jws`] over an arbitrary serializable payload.
pub struct JwsBuilder<'a, T> {
    payload: &'a T,
}

impl<'a, T: Serialize> JwsBuilder<'a, T> {
    /// Returns a new [`JwsBuilder`] over `payload`.
    pub const fn new(payload: &'a T) -> Self {
        Self { payload }
    }

    /// Sign the payload, producing a single-signature [`Jws`].
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized or signing fails.
    pub async fn build(self, signer: &impl Signer) -> Result<Jws> {
        let payload_bytes = serde_json::to_vec(self.payload)
            .map_err(|e| crate::unexpected!("failed to serialize payload: {e}"))?;
        let payload = Base64UrlUnpadded::encode_string(&payload_bytes);

        let header = Header {
            alg: "EdDSA".to_string(),
            kid: signer.verification_method().await.map_err(|e| Error::Collaborator(e.into()))?,
        };
        let header_bytes = serde_json::to_vec(&header)
            .map_err(|e| crate::unexpected!("failed to serialize header: {e}"))?;
        let protected = Base64UrlUnpadded::encode_string(&header_bytes);

        let signing_input = format!("{protected}.{payload}");
        let sig_bytes = signer
            .try_sign(signing_input.as_bytes())
            .await
            .map_err(|e| Error::Collaborator(e.into()))?;
        let signature = Base64UrlUnpadded::encode_string(&sig_bytes);

        Ok(Jws {
            payload,
            signatures: vec![Signature { protected, signature }],
        })
    }
}
