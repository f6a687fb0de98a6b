use std::{fmt, sync::Arc};

use ring::signature::RsaKeyPair;

use super::SigningAlgorithm;
use crate::{error, jws};

/// An RSA key pair able to sign tokens
///
/// Only used to mint tokens for tests and local tooling; the service itself
/// never holds a private key.
#[derive(Clone)]
#[must_use]
pub struct PrivateKey {
    der: Arc<[u8]>,
    ring_cache: Arc<RsaKeyPair>,
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for PrivateKey {}

impl PrivateKey {
    /// Imports an RSA key pair from a PKCS#1 `RSAPrivateKey` DER document
    ///
    /// # Errors
    ///
    /// The document is not a valid RSA private key, or its modulus is
    /// outside the range `ring` supports.
    pub fn from_der(der: &[u8]) -> Result<Self, error::KeyRejected> {
        let key_pair =
            RsaKeyPair::from_der(der).map_err(|e| error::KeyRejected::new(e.to_string()))?;

        Ok(Self {
            der: Arc::from(der),
            ring_cache: Arc::new(key_pair),
        })
    }

    /// The RSA key pair in DER encoding
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("modulus_len", &self.ring_cache.public().modulus_len())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl jws::Signer for PrivateKey {
    type Algorithm = SigningAlgorithm;
    type Error = ring::error::Unspecified;

    fn sign(&self, alg: Self::Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error> {
        let mut buf = vec![0; self.ring_cache.public().modulus_len()];
        self.ring_cache
            .sign(
                alg.into_signing_params(),
                &ring::rand::SystemRandom::new(),
                data,
                &mut buf,
            )?;
        Ok(buf)
    }
}
