//! Reasons a token or key is refused
//!
//! Verification walks a fixed path: split the token, check its algorithm
//! against the validator, check the signature with a key, decode the payload,
//! then judge the claims. Each step fails with one type from this module, and
//! [`JwtVerifyError`] is what a caller of
//! [`Decomposed::verify`](crate::jwt::Decomposed::verify) sees.

use std::{borrow::Cow, error::Error as StdError, fmt};

use thiserror::Error;

use crate::jwa;

type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// A section of a compact JWT
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenSection {
    /// The dot-separated layout of the token as a whole
    Layout,
    /// The JOSE header
    Header,
    /// The claims payload
    Payload,
    /// The signature
    Signature,
}

impl fmt::Display for TokenSection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Layout => "layout",
            Self::Header => "header",
            Self::Payload => "payload",
            Self::Signature => "signature",
        })
    }
}

/// A token that could not be taken apart or decoded
#[derive(Debug, Error)]
#[error("malformed JWT {section}")]
pub struct MalformedToken {
    section: TokenSection,
    #[source]
    cause: Option<Cause>,
}

impl MalformedToken {
    /// The section that could not be read
    #[must_use]
    pub fn section(&self) -> TokenSection {
        self.section
    }

    pub(crate) fn layout() -> Self {
        Self {
            section: TokenSection::Layout,
            cause: None,
        }
    }

    pub(crate) fn header(cause: impl Into<Cause>) -> Self {
        Self::caused_by(TokenSection::Header, cause.into())
    }

    pub(crate) fn payload(cause: impl Into<Cause>) -> Self {
        Self::caused_by(TokenSection::Payload, cause.into())
    }

    pub(crate) fn signature(cause: impl Into<Cause>) -> Self {
        Self::caused_by(TokenSection::Signature, cause.into())
    }

    fn caused_by(section: TokenSection, cause: Cause) -> Self {
        Self {
            section,
            cause: Some(cause),
        }
    }
}

/// A key that may not be used the way a token asks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum KeyMismatch {
    /// The key is published for encryption rather than signatures
    #[error("key is not published for signatures")]
    Usage,

    /// The key is bound to, or only capable of, other algorithms
    #[error("key cannot be used with '{0}'")]
    Algorithm(jwa::Algorithm),
}

/// The signature does not match the signed data
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Error)]
#[error("signature mismatch")]
pub struct SignatureMismatch;

/// Key material that cannot be used at all
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("key rejected: {reason}")]
pub struct KeyRejected {
    reason: Cow<'static, str>,
}

impl KeyRejected {
    pub(crate) fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Why the key was rejected
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A configured algorithm name that this family of crates cannot verify
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("'{0}' is not a supported asymmetric signing algorithm")]
pub struct UnknownAlgorithm(pub(crate) String);

/// A key refused to vouch for a signature
#[derive(Clone, Copy, Debug, Error)]
pub enum JwkVerifyError {
    /// The key may not be used for this token
    #[error(transparent)]
    Key(#[from] KeyMismatch),

    /// The key did not produce this signature
    #[error(transparent)]
    Signature(#[from] SignatureMismatch),
}

/// A token that failed verification
#[derive(Debug, Error)]
pub enum JwtVerifyError {
    /// The token could not be taken apart or its payload decoded
    #[error(transparent)]
    Malformed(#[from] MalformedToken),

    /// The key rejected the token's signature
    #[error("token rejected by JWK")]
    Rejected(#[from] JwkVerifyError),

    /// The token's algorithm or claims were not acceptable
    #[error("token rejected by claims validator")]
    Claims(#[from] ClaimsRejected),
}

/// A token that could not be minted
#[cfg(feature = "private-keys")]
#[derive(Debug, Error)]
pub enum JwtSigningError {
    /// The header names an algorithm the key cannot sign with
    #[error(transparent)]
    Key(#[from] KeyMismatch),

    /// The header or payload could not be serialized
    #[error("unable to serialize JWT section")]
    Serialize(#[from] serde_json::Error),

    /// The signing operation itself failed
    #[error("unable to sign JWT")]
    Signing(#[from] ring::error::Unspecified),
}

/// A verified token whose algorithm or claims are not acceptable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ClaimsRejected {
    /// The token algorithm is not acceptable
    #[error("invalid algorithm")]
    InvalidAlgorithm,

    /// The token audience is not acceptable
    #[error("invalid audience")]
    InvalidAudience,

    /// The token issuer is not acceptable
    #[error("invalid issuer")]
    InvalidIssuer,

    /// The token is expired according to the `exp` claim
    #[error("token expired")]
    TokenExpired,

    /// The token is not yet valid according to the `nbf` claim
    #[error("token not yet valid")]
    TokenNotYetValid,

    /// A required claim is missing
    #[error("required {0} claim missing")]
    MissingRequiredClaim(&'static str),
}
