use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{error, jwa};

/// The algorithm named by a JWT header or a JWK
///
/// Any `alg` value can be represented so that a token header naming an
/// unexpected algorithm still parses and can be rejected on policy grounds,
/// rather than being indistinguishable from a corrupt token.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum Algorithm {
    /// An RSA signature algorithm; the only family this crate can verify
    Rsa(jwa::rsa::SigningAlgorithm),

    /// A shared-secret HMAC algorithm
    Symmetric(SymmetricAlgorithm),

    /// Any other algorithm name, including `none`
    Unsupported,
}

/// Shared-secret signature algorithms
///
/// These are never accepted. A verifier that allowed them could be tricked
/// into treating a published RSA public key as an HMAC secret.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum SymmetricAlgorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
}

impl Algorithm {
    /// The RS256 signing algorithm
    pub const RS256: Algorithm = Self::Rsa(jwa::rsa::SigningAlgorithm::RS256);
    /// The RS384 signing algorithm
    pub const RS384: Algorithm = Self::Rsa(jwa::rsa::SigningAlgorithm::RS384);
    /// The RS512 signing algorithm
    pub const RS512: Algorithm = Self::Rsa(jwa::rsa::SigningAlgorithm::RS512);
    /// The PS256 signing algorithm
    pub const PS256: Algorithm = Self::Rsa(jwa::rsa::SigningAlgorithm::PS256);
    /// The PS384 signing algorithm
    pub const PS384: Algorithm = Self::Rsa(jwa::rsa::SigningAlgorithm::PS384);
    /// The PS512 signing algorithm
    pub const PS512: Algorithm = Self::Rsa(jwa::rsa::SigningAlgorithm::PS512);

    /// The HS256 algorithm, recognized only to be rejected
    pub const HS256: Algorithm = Self::Symmetric(SymmetricAlgorithm::HS256);

    /// Interprets the `alg` member of a JOSE header
    ///
    /// Never fails; names outside the RSA and HMAC families become
    /// [`Algorithm::Unsupported`].
    pub fn from_header_value(value: &str) -> Self {
        match value {
            "RS256" => Self::RS256,
            "RS384" => Self::RS384,
            "RS512" => Self::RS512,
            "PS256" => Self::PS256,
            "PS384" => Self::PS384,
            "PS512" => Self::PS512,
            "HS256" => Self::Symmetric(SymmetricAlgorithm::HS256),
            "HS384" => Self::Symmetric(SymmetricAlgorithm::HS384),
            "HS512" => Self::Symmetric(SymmetricAlgorithm::HS512),
            _ => Self::Unsupported,
        }
    }

    /// Whether this is an asymmetric algorithm that a public key can verify
    #[must_use]
    pub fn is_asymmetric(self) -> bool {
        matches!(self, Self::Rsa(_))
    }

    /// Gets the usage related to this algorithm
    pub fn to_usage(self) -> jwa::Usage {
        jwa::Usage::Signing
    }
}

impl From<jwa::rsa::SigningAlgorithm> for Algorithm {
    #[inline]
    fn from(alg: jwa::rsa::SigningAlgorithm) -> Self {
        Self::Rsa(alg)
    }
}

/// Parses a configured algorithm name
///
/// Unlike [`Algorithm::from_header_value`], only the verifiable RSA family
/// is accepted, so a deployment cannot be configured into accepting
/// symmetric or unsigned tokens.
impl FromStr for Algorithm {
    type Err = error::UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::from_header_value(s) {
            alg @ Self::Rsa(_) => Ok(alg),
            _ => Err(error::UnknownAlgorithm(s.to_owned())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Rsa(alg) => fmt::Display::fmt(alg, f),
            Self::Symmetric(SymmetricAlgorithm::HS256) => f.write_str("HS256"),
            Self::Symmetric(SymmetricAlgorithm::HS384) => f.write_str("HS384"),
            Self::Symmetric(SymmetricAlgorithm::HS512) => f.write_str("HS512"),
            Self::Unsupported => f.write_str("unsupported"),
        }
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Ok(Self::from_header_value(&name))
    }
}
