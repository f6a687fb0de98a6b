//! The subset of the Javascript/JSON Object Signing and Encryption (JOSE)
//! standards needed to accept bearer tokens from an OAuth2 identity provider
//! that signs with RSA keys:
//!
//! * JSON Web Signature (JWS): [RFC7515][]
//! * JSON Web Key (JWK): [RFC7517][]
//! * JSON Web Algorithms (JWA): [RFC7518][]
//! * JSON Web Token (JWT): [RFC7519][]
//!
//! Only the RSA family of signature algorithms can be verified. Symmetric
//! (`HS*`) algorithm names are recognized so that tokens naming them can be
//! rejected explicitly, but no key held by this crate will ever verify them.
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515
//! [RFC7517]: https://tools.ietf.org/html/rfc7517
//! [RFC7518]: https://tools.ietf.org/html/rfc7518
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! # Example
//!
//! ```no_run
//! use barista::{jwk, jwt, jwa, Jwks, JwtRef};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let jwks: Jwks = serde_json::from_str(r#"{"keys":[]}"#)?;
//! let token = JwtRef::from_str("eyJhbGciOiJSUzI1NiIsImtpZCI6ImEifQ.e30.c2ln");
//!
//! let validator = jwt::CoreValidator::default()
//!     .add_approved_algorithm(jwa::Algorithm::RS256)
//!     .add_allowed_audience(jwt::Audience::from_static("coffee"))
//!     .require_issuer(jwt::Issuer::from_static("https://example.auth0.com/"));
//!
//! let decomposed: jwt::Decomposed = token.decompose()?;
//! let kid = jwt::CoreHeaders::kid(&decomposed).ok_or("no kid")?;
//! let key = jwks.get_key_by_id(kid).ok_or("unknown key")?;
//! let validated: jwt::Validated = decomposed.verify(key, &validator)?;
//! # let _ = validated;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod b64;
pub mod clock;
pub mod error;
pub mod jwa;
pub mod jwk;
mod jwks;
pub mod jws;
pub mod jwt;

#[cfg(test)]
pub(crate) mod test;

#[doc(inline)]
pub use b64::{Base64Url, InvalidBase64Data};
#[doc(inline)]
pub use jwk::Jwk;
#[doc(inline)]
pub use jwks::Jwks;
#[doc(inline)]
pub use jwt::{Jwt, JwtRef};
