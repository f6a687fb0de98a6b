//! Implementations of the JSON Web Keys (JWK) standard
//!
//! The specifications for JSON Web Keys can be found in [RFC7517][].
//!
//! [RFC7517]: https://tools.ietf.org/html/rfc7517

use std::convert::TryFrom;

use aliri_braid::braid;
use serde::{Deserialize, Serialize, Serializer};

use crate::{error, jwa, jws::Verifier};

/// An identifier for a JWK
#[braid(serde, ref_doc = "A borrowed reference to JWK identifier ([`KeyId`])")]
pub struct KeyId;

/// An identified JSON Web Key
///
/// Only RSA public keys (`"kty": "RSA"`) are representable; anything else
/// fails to deserialize and is skipped when read as part of a [`Jwks`](crate::Jwks).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "JwkDto")]
#[must_use]
pub struct Jwk {
    key_id: Option<KeyId>,
    usage: Option<jwa::Usage>,
    algorithm: Option<jwa::Algorithm>,
    key: jwa::rsa::PublicKey,
}

impl Jwk {
    /// The key ID
    #[must_use]
    pub fn key_id(&self) -> Option<&KeyIdRef> {
        self.key_id.as_deref()
    }

    /// The intended usage of the key
    #[must_use]
    pub fn usage(&self) -> Option<jwa::Usage> {
        self.usage
    }

    /// The algorithm to be used with this JWK
    #[must_use]
    pub fn algorithm(&self) -> Option<jwa::Algorithm> {
        self.algorithm
    }

    /// The RSA public key
    pub fn public_key(&self) -> &jwa::rsa::PublicKey {
        &self.key
    }

    /// Sets the key ID
    pub fn with_key_id(self, kid: KeyId) -> Self {
        Self {
            key_id: Some(kid),
            ..self
        }
    }

    /// Sets the algorithm and usage consistent with that algorithm
    pub fn with_algorithm(self, alg: impl Into<jwa::Algorithm>) -> Self {
        let alg = alg.into();
        Self {
            algorithm: Some(alg),
            usage: Some(alg.to_usage()),
            ..self
        }
    }
}

impl From<jwa::rsa::PublicKey> for Jwk {
    fn from(key: jwa::rsa::PublicKey) -> Self {
        Self {
            key_id: None,
            usage: None,
            algorithm: None,
            key,
        }
    }
}

impl Verifier for Jwk {
    type Algorithm = jwa::Algorithm;
    type Error = error::JwkVerifyError;

    fn can_verify(&self, alg: Self::Algorithm) -> bool {
        alg.is_asymmetric() && self.algorithm.map_or(true, |key_alg| key_alg == alg)
    }

    fn verify(
        &self,
        alg: Self::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        if let Some(u) = self.usage {
            if u != jwa::Usage::Signing {
                return Err(error::KeyMismatch::Usage.into());
            }
        }

        match self.algorithm {
            Some(key_alg) if key_alg == alg => {}
            Some(_) => {
                return Err(error::KeyMismatch::Algorithm(alg).into());
            }
            None => {}
        }

        let jwa::Algorithm::Rsa(rsa_alg) = alg else {
            return Err(error::KeyMismatch::Algorithm(alg).into());
        };

        self.key.verify(rsa_alg, data, signature)?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct JwkDto {
    #[serde(rename = "kid", default)]
    key_id: Option<KeyId>,

    #[serde(rename = "use", default)]
    usage: Option<jwa::Usage>,

    #[serde(rename = "alg", default)]
    algorithm: Option<jwa::Algorithm>,

    #[serde(flatten)]
    key: Key,
}

impl TryFrom<JwkDto> for Jwk {
    type Error = error::KeyMismatch;

    fn try_from(dto: JwkDto) -> Result<Self, Self::Error> {
        if let Some(alg) = dto.algorithm {
            if !alg.is_asymmetric() {
                return Err(error::KeyMismatch::Algorithm(alg));
            }
        }

        let Key::Rsa(key) = dto.key;

        Ok(Self {
            key_id: dto.key_id,
            usage: dto.usage,
            algorithm: dto.algorithm,
            key,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct JwkDtoRef<'a> {
    #[serde(rename = "kty")]
    key_type: &'static str,

    #[serde(rename = "kid", skip_serializing_if = "Option::is_none")]
    key_id: Option<&'a KeyIdRef>,

    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    usage: Option<jwa::Usage>,

    #[serde(rename = "alg", skip_serializing_if = "Option::is_none")]
    algorithm: Option<jwa::Algorithm>,

    #[serde(flatten)]
    key: &'a jwa::rsa::PublicKey,
}

impl Serialize for Jwk {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let dto = JwkDtoRef {
            key_type: "RSA",
            key_id: self.key_id(),
            usage: self.usage(),
            algorithm: self.algorithm(),
            key: &self.key,
        };

        dto.serialize(serializer)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(tag = "kty")]
enum Key {
    #[serde(rename = "RSA")]
    Rsa(jwa::rsa::PublicKey),
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;
    use crate::{test::rsa::*, Base64Url};

    #[test]
    fn deserialize() -> Result<()> {
        let key: Jwk = serde_json::from_str(JWK)?;
        assert_eq!(key.algorithm(), Some(jwa::Algorithm::RS256));
        assert_eq!(key.key_id().map(KeyIdRef::as_str), Some(TEST_KEY_ID));
        Ok(())
    }

    #[test]
    fn deserialize_minimal() -> Result<()> {
        let key: Jwk = serde_json::from_str(JWK_MINIMAL)?;
        assert_eq!(key.algorithm(), None);
        assert_eq!(key.key_id(), None);
        Ok(())
    }

    #[test]
    fn serialization_keeps_key_type() -> Result<()> {
        let key: Jwk = serde_json::from_str(JWK)?;
        let value = serde_json::to_value(&key)?;
        assert_eq!(value["kty"], "RSA");
        assert_eq!(value["kid"], TEST_KEY_ID);

        let again: Jwk = serde_json::from_value(value)?;
        assert_eq!(again, key);
        Ok(())
    }

    #[test]
    fn rejects_symmetric_algorithm_on_rsa_key() {
        let mut value: serde_json::Value = serde_json::from_str(JWK).unwrap();
        value["alg"] = "HS256".into();
        assert!(serde_json::from_value::<Jwk>(value).is_err());
    }

    #[test]
    fn verifies_signature_made_by_matching_private_key() -> Result<()> {
        let key: Jwk = serde_json::from_str(JWK)?;
        let signature = sign_rs256(b"message");

        key.verify(jwa::Algorithm::RS256, b"message", &signature)?;
        Ok(())
    }

    #[test]
    fn error_on_tampered_message() {
        let key: Jwk = serde_json::from_str(JWK).unwrap();
        let signature = sign_rs256(b"message");

        let err = dbg!(key.verify(jwa::Algorithm::RS256, b"massage", &signature)).unwrap_err();
        assert!(matches!(err, error::JwkVerifyError::Signature(_)));
    }

    #[test]
    fn error_verifying_with_algorithm_other_than_declared() {
        let key: Jwk = serde_json::from_str(JWK).unwrap();
        let signature = sign_rs256(b"message");

        let err = dbg!(key.verify(jwa::Algorithm::PS256, b"message", &signature)).unwrap_err();
        assert!(matches!(
            err,
            error::JwkVerifyError::Key(error::KeyMismatch::Algorithm(jwa::Algorithm::PS256))
        ));
    }

    #[test]
    fn error_verifying_symmetric_alg_with_undeclared_key() {
        let key: Jwk = serde_json::from_str(JWK_MINIMAL).unwrap();

        let err = dbg!(key.verify(jwa::Algorithm::HS256, b"", &[])).unwrap_err();
        assert!(matches!(err, error::JwkVerifyError::Key(error::KeyMismatch::Algorithm(_))));
        assert!(!key.can_verify(jwa::Algorithm::HS256));
    }

    #[test]
    fn error_using_encryption_key_for_signing() {
        let key = Jwk {
            key_id: None,
            usage: Some(jwa::Usage::Encryption),
            algorithm: None,
            key: jwa::rsa::PublicKey::from_components(
                Base64Url::from_raw(vec![0xc3; 256]),
                Base64Url::from_raw(vec![1, 0, 1]),
            )
            .unwrap(),
        };

        let err = dbg!(key.verify(jwa::Algorithm::RS256, &[], &[])).unwrap_err();
        assert!(matches!(err, error::JwkVerifyError::Key(error::KeyMismatch::Usage)));
    }
}
