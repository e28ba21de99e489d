//! Message fixtures: hand-assembled, signed `Write`/`Delete`/`Configure`
//! messages for exercising the authorization pipeline directly, without a
//! method handler in front of it. Mirrors the fluent-builder shape the
//! teacher's own message builders use (`WriteBuilder`/`ConfigureBuilder`),
//! narrowed to what a test needs to set explicitly; everything else gets a
//! reasonable default.

use base64ct::{Base64UrlUnpadded, Encoding};
use dwn_node::auth::AuthorizationBuilder;
use dwn_node::permissions::GrantData;
use dwn_node::protocols::{Configure, ConfigureDescriptor, Definition, PROTOCOL_URI};
use dwn_node::records::{Delete, DeleteDescriptor, Write, WriteDescriptor};
use dwn_node::{Descriptor, Interface, Method, Result};
use serde_json::Map;

use crate::TestSigner;

/// Inputs for [`write`], all but `data` defaulted for a root, unprotocoled
/// record.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// ISO-8601 UTC microsecond timestamp; defaults to a fixed instant if
    /// unset, since ordering and not wall-clock accuracy is what tests need.
    pub message_timestamp: Option<String>,
    /// Bytes the record is created with.
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub data_format: String,
    /// Protocol URI this record belongs to.
    pub protocol: Option<String>,
    /// Slash-separated protocol path.
    pub protocol_path: Option<String>,
    /// Parent record ID, if this is not a protocol root.
    pub parent_id: Option<String>,
    /// Parent record's context ID, required alongside `parent_id`.
    pub parent_context_id: Option<String>,
    /// DID the record is addressed to.
    pub recipient: Option<String>,
    /// Schema URI the data conforms to.
    pub schema: Option<String>,
    /// Whether the record is published.
    pub published: Option<bool>,
    /// `$tags`-matching custom tags.
    pub tags: Option<Map<String, serde_json::Value>>,
    /// Role path invoked by this write's authorization.
    pub protocol_role: Option<String>,
    /// Permission grant invoked by this write's authorization.
    pub permission_grant_id: Option<String>,
}

fn default_timestamp() -> String {
    "2025-01-01T00:00:00.000000Z".to_string()
}

/// Build and sign a `RecordsWrite` as `signer`'s initial write (or a rewrite,
/// if `record_id` is `Some`).
///
/// # Errors
/// Returns an error if the descriptor cannot be serialized or signing fails.
pub async fn write(signer: &TestSigner, opts: WriteOptions) -> Result<Write> {
    let message_timestamp = opts.message_timestamp.unwrap_or_else(default_timestamp);
    let data_cid = dwn_node::cid::digest_bytes(&opts.data);

    let descriptor = WriteDescriptor {
        base: Descriptor {
            interface: Interface::Records,
            method: Method::Write,
            message_timestamp: message_timestamp.clone(),
        },
        protocol: opts.protocol,
        protocol_path: opts.protocol_path.clone(),
        parent_id: opts.parent_id.clone(),
        recipient: opts.recipient,
        schema: opts.schema,
        data_format: opts.data_format,
        data_cid,
        data_size: opts.data.len() as u64,
        published: opts.published,
        tags: opts.tags,
        date_created: message_timestamp,
    };

    let record_id = dwn_node::records::record_id(signer.did(), &descriptor)?;

    let context_id = match (&opts.protocol_path, &opts.parent_context_id) {
        (Some(path), Some(parent_context)) if path.contains('/') => {
            Some(format!("{parent_context}/{record_id}"))
        }
        (Some(_), _) => Some(record_id.clone()),
        (None, _) => None,
    };

    let descriptor_cid = dwn_node::cid::compute(&descriptor)?;
    let mut builder = AuthorizationBuilder::new().descriptor_cid(descriptor_cid).record_id(&record_id);
    if let Some(context_id) = &context_id {
        builder = builder.context_id(context_id);
    }
    if let Some(role) = &opts.protocol_role {
        builder = builder.protocol_role(role);
    }
    if let Some(grant_id) = &opts.permission_grant_id {
        builder = builder.permission_grant_id(grant_id);
    }
    let authorization = builder.build(signer).await?;

    Ok(Write {
        record_id,
        context_id,
        descriptor,
        authorization,
        attestation: None,
        encoded_data: Some(Base64UrlUnpadded::encode_string(&opts.data)),
    })
}

/// Build and sign a `RecordsDelete` for `target`'s record ID.
///
/// # Errors
/// As [`write`].
pub async fn delete(signer: &TestSigner, target: &Write, prune: bool) -> Result<Delete> {
    let descriptor = DeleteDescriptor {
        base: Descriptor {
            interface: Interface::Records,
            method: Method::Delete,
            message_timestamp: default_timestamp(),
        },
        record_id: target.record_id.clone(),
        prune,
    };
    let descriptor_cid = dwn_node::cid::compute(&descriptor)?;
    let authorization = AuthorizationBuilder::new()
        .descriptor_cid(descriptor_cid)
        .record_id(&target.record_id)
        .build(signer)
        .await?;

    Ok(Delete { descriptor, authorization })
}

/// Build and sign a `ProtocolsConfigure` installing `definition`.
///
/// # Errors
/// As [`write`].
pub async fn configure(signer: &TestSigner, definition: Definition) -> Result<Configure> {
    let descriptor = ConfigureDescriptor {
        base: Descriptor {
            interface: Interface::Protocols,
            method: Method::Configure,
            message_timestamp: default_timestamp(),
        },
        definition,
    };
    let descriptor_cid = dwn_node::cid::compute(&descriptor)?;
    let authorization =
        AuthorizationBuilder::new().descriptor_cid(descriptor_cid).build(signer).await?;

    Ok(Configure { descriptor, authorization })
}

/// Build and sign a `PermissionsGrant` record, a `RecordsWrite` at the
/// reserved permissions protocol's `grant` path, addressed to `grantee`.
///
/// # Errors
/// As [`write`].
pub async fn grant(signer: &TestSigner, grantee: &str, data: &GrantData) -> Result<Write> {
    let bytes = serde_json::to_vec(data).map_err(|e| dwn_node::unexpected!("{e}"))?;
    write(
        signer,
        WriteOptions {
            data: bytes,
            data_format: "application/json".to_string(),
            protocol: Some(PROTOCOL_URI.to_string()),
            protocol_path: Some("grant".to_string()),
            recipient: Some(grantee.to_string()),
            ..WriteOptions::default()
        },
    )
    .await
}

/// Build and sign a `PermissionsRevoke` record for `grant`, a `RecordsWrite`
/// at the permissions protocol's `revocation` path, parented to the grant.
///
/// # Errors
/// As [`write`].
pub async fn revoke(signer: &TestSigner, grant: &Write) -> Result<Write> {
    write(
        signer,
        WriteOptions {
            data: Vec::new(),
            data_format: "application/json".to_string(),
            protocol: Some(PROTOCOL_URI.to_string()),
            protocol_path: Some("revocation".to_string()),
            parent_id: Some(grant.record_id.clone()),
            ..WriteOptions::default()
        },
    )
    .await
}
