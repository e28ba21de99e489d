//! # Error
//!
//! The tagged error taxonomy returned by every fallible operation in the
//! authorization core. Nothing in this crate panics on a malformed message or
//! store response; every such condition is a named `Error` variant instead.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category an [`Error`] belongs to, used to pick a transport status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    /// Message structure or content-address failed to validate.
    Integrity,
    /// Signature verification or key resolution failed.
    Authentication,
    /// Protocol rule-set evaluation rejected the message.
    Protocol,
    /// Permission grant evaluation rejected the message.
    Grant,
    /// A CID could not be parsed or uses an unsupported codec/hash.
    ContentAddressing,
    /// The referenced record, grant, or protocol definition does not exist.
    NotFound,
    /// The message conflicts with a newer message already stored.
    Conflict,
    /// An external collaborator (store, resolver, signer) failed.
    Collaborator,
}

/// Errors produced by the authorization and protocol-enforcement core.
#[derive(Debug, Error)]
pub enum Error {
    // -- integrity (§7 Integrity) --
    #[error("authorization missing: {0}")]
    AuthorizationMissing(String),
    #[error("signature count invalid: {0}")]
    SignatureCountInvalid(String),
    #[error("descriptor CID mismatch: {0}")]
    DescriptorCidMismatch(String),
    #[error("payload failed schema validation: {0}")]
    PayloadSchemaInvalid(String),
    #[error("payload carries an extraneous property: {0}")]
    PayloadExtraneousProperty(String),
    #[error("payload property is not a valid CID: {0}")]
    PayloadPropertyNotCid(String),
    #[error("timestamp is not valid ISO-8601 UTC microsecond precision: {0}")]
    TimestampInvalid(String),

    // -- authentication (§7 Authentication) --
    #[error("JWS missing where required: {0}")]
    AuthenticateJwsMissing(String),
    #[error("signer not found: {0}")]
    AuthenticateSignerNotFound(String),
    #[error("signature algorithm unsupported: {0}")]
    AuthenticateAlgorithmUnsupported(String),
    #[error("signature invalid: {0}")]
    AuthenticateSignatureInvalid(String),

    // -- protocol authorization (§7 Protocol authorization) --
    #[error("protocol definition not found: {0}")]
    ProtocolDefinitionNotFound(String),
    #[error("invalid type for protocol: {0}")]
    InvalidType(String),
    #[error("invalid schema for type: {0}")]
    InvalidSchema(String),
    #[error("incorrect data format: {0}")]
    IncorrectDataFormat(String),
    #[error("incorrect protocol path: {0}")]
    IncorrectProtocolPath(String),
    #[error("no rule set defined for protocol path: {0}")]
    MissingRuleSet(String),
    #[error("protocol path does not reference a role: {0}")]
    NotARole(String),
    #[error("no matching role record found: {0}")]
    MissingRole(String),
    #[error("action not allowed: {0}")]
    ActionNotAllowed(String),
    #[error("DID is already the recipient of a global role record: {0}")]
    DuplicateRoleRecipientGlobal(String),
    #[error("DID is already the recipient of a context role record: {0}")]
    DuplicateRoleRecipientContext(String),
    #[error("role record is missing a recipient: {0}")]
    RoleMissingRecipient(String),
    #[error("initial write author mismatch: {0}")]
    InitialWriteAuthorMismatch(String),
    #[error("ancestor record not found: {0}")]
    AncestorNotFound(String),
    #[error("ancestor chain contains a cycle: {0}")]
    AncestorCycle(String),

    // -- grant authorization (§7 Grant authorization) --
    #[error("grant not found: {0}")]
    GrantNotFound(String),
    #[error("grant grantor mismatch: {0}")]
    GrantGrantorMismatch(String),
    #[error("grant tenant mismatch: {0}")]
    GrantTenantMismatch(String),
    #[error("grant grantee mismatch: {0}")]
    GrantGranteeMismatch(String),
    #[error("grant not yet active: {0}")]
    GrantNotYetActive(String),
    #[error("grant expired: {0}")]
    GrantExpired(String),
    #[error("grant has been revoked: {0}")]
    GrantRevoked(String),
    #[error("grant interface mismatch: {0}")]
    GrantInterfaceMismatch(String),
    #[error("grant method mismatch: {0}")]
    GrantMethodMismatch(String),
    #[error("grant scope mismatch: {0}")]
    GrantScopeMismatch(String),

    // -- content addressing (§7 Content-addressing) --
    #[error("CID codec not supported: {0}")]
    CidCodecNotSupported(String),
    #[error("CID multihash not supported: {0}")]
    CidMultihashNotSupported(String),
    #[error("CID could not be parsed: {0}")]
    CidParseError(String),

    // -- not found / conflict, used by store-facing callers --
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),

    /// Propagated failure from a store, resolver, or signer collaborator.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl Error {
    /// The broad category this error belongs to.
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::AuthorizationMissing(_)
            | Self::SignatureCountInvalid(_)
            | Self::DescriptorCidMismatch(_)
            | Self::PayloadSchemaInvalid(_)
            | Self::PayloadExtraneousProperty(_)
            | Self::PayloadPropertyNotCid(_)
            | Self::TimestampInvalid(_) => Category::Integrity,

            Self::AuthenticateJwsMissing(_)
            | Self::AuthenticateSignerNotFound(_)
            | Self::AuthenticateAlgorithmUnsupported(_)
            | Self::AuthenticateSignatureInvalid(_) => Category::Authentication,

            Self::ProtocolDefinitionNotFound(_)
            | Self::InvalidType(_)
            | Self::InvalidSchema(_)
            | Self::IncorrectDataFormat(_)
            | Self::IncorrectProtocolPath(_)
            | Self::MissingRuleSet(_)
            | Self::NotARole(_)
            | Self::MissingRole(_)
            | Self::ActionNotAllowed(_)
            | Self::DuplicateRoleRecipientGlobal(_)
            | Self::DuplicateRoleRecipientContext(_)
            | Self::RoleMissingRecipient(_)
            | Self::InitialWriteAuthorMismatch(_)
            | Self::AncestorNotFound(_)
            | Self::AncestorCycle(_) => Category::Protocol,

            Self::GrantNotFound(_)
            | Self::GrantGrantorMismatch(_)
            | Self::GrantTenantMismatch(_)
            | Self::GrantGranteeMismatch(_)
            | Self::GrantNotYetActive(_)
            | Self::GrantExpired(_)
            | Self::GrantRevoked(_)
            | Self::GrantInterfaceMismatch(_)
            | Self::GrantMethodMismatch(_)
            | Self::GrantScopeMismatch(_) => Category::Grant,

            Self::CidCodecNotSupported(_)
            | Self::CidMultihashNotSupported(_)
            | Self::CidParseError(_) => Category::ContentAddressing,

            Self::NotFound(_) => Category::NotFound,
            Self::Conflict(_) => Category::Conflict,
            Self::Collaborator(_) => Category::Collaborator,
        }
    }

    /// Stable code string for this variant, suitable for logs and wire replies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AuthorizationMissing(_) => "AuthorizationMissing",
            Self::SignatureCountInvalid(_) => "SignatureCountInvalid",
            Self::DescriptorCidMismatch(_) => "DescriptorCidMismatch",
            Self::PayloadSchemaInvalid(_) => "PayloadSchemaInvalid",
            Self::PayloadExtraneousProperty(_) => "PayloadExtraneousProperty",
            Self::PayloadPropertyNotCid(_) => "PayloadPropertyNotCid",
            Self::TimestampInvalid(_) => "TimestampInvalid",
            Self::AuthenticateJwsMissing(_) => "AuthenticateJwsMissing",
            Self::AuthenticateSignerNotFound(_) => "AuthenticateSignerNotFound",
            Self::AuthenticateAlgorithmUnsupported(_) => "AuthenticateAlgorithmUnsupported",
            Self::AuthenticateSignatureInvalid(_) => "AuthenticateSignatureInvalid",
            Self::ProtocolDefinitionNotFound(_) => "ProtocolDefinitionNotFound",
            Self::InvalidType(_) => "InvalidType",
            Self::InvalidSchema(_) => "InvalidSchema",
            Self::IncorrectDataFormat(_) => "IncorrectDataFormat",
            Self::IncorrectProtocolPath(_) => "IncorrectProtocolPath",
            Self::MissingRuleSet(_) => "MissingRuleSet",
            Self::NotARole(_) => "NotARole",
            Self::MissingRole(_) => "MissingRole",
            Self::ActionNotAllowed(_) => "ActionNotAllowed",
            Self::DuplicateRoleRecipientGlobal(_) => "DuplicateRoleRecipientGlobal",
            Self::DuplicateRoleRecipientContext(_) => "DuplicateRoleRecipientContext",
            Self::RoleMissingRecipient(_) => "RoleMissingRecipient",
            Self::InitialWriteAuthorMismatch(_) => "InitialWriteAuthorMismatch",
            Self::AncestorNotFound(_) => "AncestorNotFound",
            Self::AncestorCycle(_) => "AncestorCycle",
            Self::GrantNotFound(_) => "GrantNotFound",
            Self::GrantGrantorMismatch(_) => "GrantGrantorMismatch",
            Self::GrantTenantMismatch(_) => "GrantTenantMismatch",
            Self::GrantGranteeMismatch(_) => "GrantGranteeMismatch",
            Self::GrantNotYetActive(_) => "GrantNotYetActive",
            Self::GrantExpired(_) => "GrantExpired",
            Self::GrantRevoked(_) => "GrantRevoked",
            Self::GrantInterfaceMismatch(_) => "GrantInterfaceMismatch",
            Self::GrantMethodMismatch(_) => "GrantMethodMismatch",
            Self::GrantScopeMismatch(_) => "GrantScopeMismatch",
            Self::CidCodecNotSupported(_) => "CidCodecNotSupported",
            Self::CidMultihashNotSupported(_) => "CidMultihashNotSupported",
            Self::CidParseError(_) => "CidParseError",
            Self::NotFound(_) => "NotFound",
            Self::Conflict(_) => "Conflict",
            Self::Collaborator(_) => "Collaborator",
        }
    }

    /// Transport status code a handler should map this error to.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.category() {
            Category::Integrity => 400,
            Category::Authentication | Category::Protocol | Category::Grant => 401,
            Category::ContentAddressing => 400,
            Category::NotFound => 404,
            Category::Conflict => 409,
            Category::Collaborator => 500,
        }
    }
}

/// Build a [`Error::ActionNotAllowed`], logging it at `warn` first.
///
/// Mirrors the `forbidden!` helper macro referenced throughout the teacher's
/// handler call sites.
#[macro_export]
macro_rules! forbidden {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        tracing::warn!(code = "ActionNotAllowed", %msg, "authorization denied");
        $crate::Error::ActionNotAllowed(msg)
    }};
}

/// Build a [`Error::Collaborator`] wrapping an unexpected-state message.
///
/// Mirrors the `unexpected!` helper macro referenced throughout the
/// teacher's handler call sites, used for invariant violations that
/// shouldn't occur if upstream collaborators behave.
#[macro_export]
macro_rules! unexpected {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        tracing::warn!(%msg, "unexpected state");
        $crate::Error::Collaborator(anyhow::anyhow!(msg))
    }};
}
