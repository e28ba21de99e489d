//! # CID (Content Identifier) service
//!
//! Computes and parses CIDv1 content identifiers over canonical CBOR with a
//! SHA-256 digest, the addressing scheme every message descriptor and data
//! blob in the node uses.

use std::str::FromStr;

use multihash_codetable::{Code, MultihashDigest};
use serde::Serialize;

use crate::{Error, Result};

/// Raw-binary multicodec, used for both descriptor and data-block CIDs.
const RAW: u64 = 0x55;

/// Compute the canonical CID of a serializable value.
///
/// # Errors
/// Returns an error if the value cannot be encoded as CBOR.
pub fn compute<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| Error::Collaborator(e.into()))?;
    Ok(digest_bytes(&buf))
}

/// Compute the canonical CID directly over raw bytes (used for data-blob
/// addressing, where the bytes are not themselves CBOR).
#[must_use]
pub fn digest_bytes(bytes: &[u8]) -> String {
    let hash = Code::Sha2_256.digest(bytes);
    cid::Cid::new_v1(RAW, hash).to_string()
}

/// Parse a CID string, failing if it does not use the raw codec + SHA-256
/// multihash combination this node produces.
///
/// # Errors
/// Returns [`Error::CidParseError`], [`Error::CidCodecNotSupported`], or
/// [`Error::CidMultihashNotSupported`] as appropriate.
pub fn parse(value: &str) -> Result<cid::Cid> {
    let parsed =
        cid::Cid::from_str(value).map_err(|e| Error::CidParseError(format!("{value}: {e}")))?;

    if parsed.codec() != RAW {
        return Err(Error::CidCodecNotSupported(format!(
            "codec {} is not supported",
            parsed.codec()
        )));
    }
    if parsed.hash().code() != u64::from(Code::Sha2_256) {
        return Err(Error::CidMultihashNotSupported(format!(
            "multihash code {} is not supported",
            parsed.hash().code()
        )));
    }

    Ok(parsed)
}
