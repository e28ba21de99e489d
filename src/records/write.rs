//! # Records Write

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::auth::Authorization;
use crate::permissions::{Grant, GrantData};
use crate::{Descriptor, Error, Result};

/// A `RecordsWrite` message: creates a record, or supersedes an earlier
/// write of the same `record_id`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    /// The ID of the record this message writes to.
    pub record_id: String,

    /// The context ID, present for protocol-context records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// The write descriptor.
    pub descriptor: WriteDescriptor,

    /// The message authorization.
    pub authorization: Authorization,

    /// An author attestation over the descriptor, distinct from the
    /// authorization signature so that delegates can attest without
    /// impersonating the logical author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation: Option<Attestation>,

    /// Data inlined in the message when small enough to avoid a separate
    /// block-store round trip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_data: Option<String>,
}

/// `RecordsWrite` descriptor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteDescriptor {
    /// Fields common to every descriptor.
    #[serde(flatten)]
    pub base: Descriptor,

    /// The protocol this record belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Slash-separated path from the protocol root to this record's type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_path: Option<String>,

    /// The ID of this record's parent, if it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// The DID the record is addressed to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,

    /// Schema URI the data conforms to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// MIME type of `data`.
    pub data_format: String,

    /// CID of the data.
    pub data_cid: String,

    /// Size of the data, in bytes.
    pub data_size: u64,

    /// Whether the record is published (publicly readable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,

    /// Custom tags used by protocol `$tags` rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, serde_json::Value>>,

    /// When the record was first created. Immutable across rewrites.
    pub date_created: String,
}

/// An attestation over a write's descriptor.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Attestation {
    /// The attestation JWS.
    #[serde(flatten)]
    pub jws: crate::auth::Jws,
}

impl Write {
    /// `true` if this write is the initial write for its `record_id` (C9):
    /// its `record_id` equals the canonical CID of `(descriptor, author)`,
    /// and `dateCreated == messageTimestamp` as required by
    /// `SPEC_FULL.md` §9.1.
    ///
    /// # Errors
    /// Returns an error if the author cannot be determined.
    pub fn is_initial(&self) -> Result<bool> {
        let author = self.authorization.author()?;
        Ok(crate::records::is_initial_write(&author, &self.descriptor, &self.record_id)?
            && self.descriptor.date_created == self.descriptor.base.message_timestamp)
    }

    /// Flattened index fields used to locate this write via
    /// [`crate::provider::MessageStore::find`].
    #[must_use]
    pub fn build_indexes(&self) -> Vec<(String, String)> {
        let mut indexes = vec![
            ("interface".to_string(), self.descriptor.base.interface.to_string()),
            ("method".to_string(), self.descriptor.base.method.to_string()),
            ("recordId".to_string(), self.record_id.clone()),
        ];
        if let Some(protocol) = &self.descriptor.protocol {
            indexes.push(("protocol".to_string(), protocol.clone()));
        }
        if let Some(protocol_path) = &self.descriptor.protocol_path {
            indexes.push(("protocolPath".to_string(), protocol_path.clone()));
        }
        if let Some(context_id) = &self.context_id {
            indexes.push(("contextId".to_string(), context_id.clone()));
        }
        if let Some(recipient) = &self.descriptor.recipient {
            indexes.push(("recipient".to_string(), recipient.clone()));
        }
        indexes
    }
}

/// A grant a delegate uses to sign on behalf of its grantor, attached
/// inline to the message it authorizes rather than looked up in the store.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DelegatedGrant {
    /// The grant's write descriptor.
    pub descriptor: WriteDescriptor,

    /// The grantor's authorization over the grant.
    pub authorization: Authorization,

    /// The base64url-encoded grant data.
    pub encoded_data: String,
}

impl DelegatedGrant {
    /// Parse the embedded grant data into a [`Grant`].
    ///
    /// # Errors
    /// Returns an error if the grant data is malformed.
    pub fn to_grant(&self) -> Result<Grant> {
        let bytes = Base64UrlUnpadded::decode_vec(&self.encoded_data)
            .map_err(|e| Error::Collaborator(e.into()))?;
        let data: GrantData =
            serde_json::from_slice(&bytes).map_err(|e| Error::Collaborator(e.into()))?;

        Ok(Grant {
            id: crate::cid::compute(&self.descriptor)?,
            grantor: self.authorization.author()?,
            grantee: self.descriptor.recipient.clone().unwrap_or_default(),
            date_granted: self.descriptor.date_created.clone(),
            data,
        })
    }
}
