//! Producing and checking JWS signatures ([RFC7515][])
//!
//! Keys that check signatures implement [`Verifier`]. Only the test and
//! tooling builds, with the `private-keys` feature, can produce them.
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515

use std::error::Error as StdError;
#[cfg(feature = "private-keys")]
use std::fmt;

/// Checks signatures over a token's `header.payload` message
pub trait Verifier {
    /// The algorithms a signature may name
    type Algorithm;

    /// Why a signature was not accepted
    type Error: StdError + Send + Sync + 'static;

    /// Whether a signature made with `alg` could ever be accepted
    ///
    /// A `true` answer says nothing about any particular signature.
    fn can_verify(&self, alg: Self::Algorithm) -> bool;

    /// Accepts `signature` only if it was made over `data` with `alg` by the
    /// holder of the matching private key
    fn verify(
        &self,
        alg: Self::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error>;
}

/// Signs a token's `header.payload` message
#[cfg(feature = "private-keys")]
pub trait Signer {
    /// The algorithms a signature may be made with
    type Algorithm;

    /// Why no signature could be made
    type Error: fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Signs `data` with `alg`, returning the raw signature bytes
    fn sign(&self, alg: Self::Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error>;
}
