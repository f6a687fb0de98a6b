//! Bearer token authentication and permission checks for APIs protected by
//! an OAuth2 identity provider such as Auth0
//!
//! Three pieces cooperate on each request:
//!
//! * [`KeySetCache`] holds the identity provider's published JSON Web Key
//!   Set, fetching it lazily on first use and refreshing it according to a
//!   [`RefreshPolicy`].
//! * [`TokenValidator`] takes the raw `Authorization` header, checks its
//!   shape, and verifies the bearer token's signature, issuer, audience, and
//!   lifetime, producing the token's [`Claims`] or an [`AuthError`].
//! * [`PermissionChecker`] confirms that the verified claims grant a single
//!   required [`Permission`], or fails with a [`PermissionError`].
//!
//! This crate uses the definition of OAuth2 as defined in
//! [RFC 6749](https://datatracker.ietf.org/doc/html/rfc6749).
//!
//! # Feature flags
//!
//! This crate does not enable TLS support in `reqwest` itself. Enable the
//! `rustls-tls` or `default-tls` feature to fetch key sets over HTTPS.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod claims;
pub mod keyset;
mod permission;
mod validator;

pub use claims::Claims;
pub use keyset::{KeySetCache, KeySetError, RefreshPolicy};
pub use permission::{
    HasPermissions, InvalidPermission, Permission, PermissionChecker, PermissionError,
    PermissionRef, Permissions,
};
pub use validator::{AuthError, TokenValidator, ValidatorConfig};

#[cfg(test)]
pub(crate) mod test;
