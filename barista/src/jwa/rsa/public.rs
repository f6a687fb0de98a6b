use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use super::SigningAlgorithm;
use crate::{error, jws, Base64Url};

/// Accepted RSA modulus sizes in bytes, matching what `ring` will verify
const MODULUS_BYTES: std::ops::RangeInclusive<usize> = 256..=1024;

/// RSA public key components
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PublicKeyDto")]
pub struct PublicKey {
    /// The public modulus
    #[serde(rename = "n")]
    modulus: Base64Url,

    /// The public exponent
    #[serde(rename = "e")]
    exponent: Base64Url,
}

impl PublicKey {
    /// The public key's modulus
    #[must_use]
    pub fn modulus(&self) -> &[u8] {
        self.modulus.as_slice()
    }

    /// The public key's exponent
    #[must_use]
    pub fn exponent(&self) -> &[u8] {
        self.exponent.as_slice()
    }

    /// Constructs a public key from the modulus and exponent
    ///
    /// # Errors
    ///
    /// The modulus is not between 2048 and 8192 bits, or the exponent is empty.
    pub fn from_components(
        modulus: impl Into<Base64Url>,
        exponent: impl Into<Base64Url>,
    ) -> Result<Self, error::KeyRejected> {
        let modulus = modulus.into();
        let exponent = exponent.into();

        let significant = modulus
            .as_slice()
            .iter()
            .position(|&b| b != 0)
            .map_or(0, |first| modulus.as_slice().len() - first);
        if !MODULUS_BYTES.contains(&significant) {
            return Err(error::KeyRejected::new(
                "key modulus must be between 2048 and 8192 bits",
            ));
        }

        if exponent.as_slice().is_empty() {
            return Err(error::KeyRejected::new("key exponent must not be empty"));
        }

        Ok(Self { modulus, exponent })
    }
}

impl jws::Verifier for PublicKey {
    type Algorithm = SigningAlgorithm;
    type Error = error::SignatureMismatch;

    fn can_verify(&self, _alg: Self::Algorithm) -> bool {
        true
    }

    fn verify(
        &self,
        alg: Self::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        let pk = ring::signature::RsaPublicKeyComponents {
            n: self.modulus.as_slice(),
            e: self.exponent.as_slice(),
        };

        pk.verify(alg.into_verification_params(), data, signature)
            .map_err(|_| error::SignatureMismatch)
    }
}

impl TryFrom<PublicKeyDto> for PublicKey {
    type Error = error::KeyRejected;

    fn try_from(dto: PublicKeyDto) -> Result<Self, Self::Error> {
        Self::from_components(dto.modulus, dto.exponent)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
struct PublicKeyDto {
    #[serde(rename = "n")]
    modulus: Base64Url,

    #[serde(rename = "e")]
    exponent: Base64Url,
}
