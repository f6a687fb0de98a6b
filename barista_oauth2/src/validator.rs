use std::{fmt, sync::Arc, time::Duration};

use barista::{
    clock::{Clock, System},
    error::{ClaimsRejected, JwtVerifyError},
    jwa,
    jwt::{self, CoreHeaders},
    JwtRef,
};
use http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::{KeySetCache, KeySetError};

/// A bearer token could not be authenticated
///
/// The [`Display`](fmt::Display) implementation is the message that may be
/// shown to the client. Underlying causes are available through
/// [`source`](std::error::Error::source) for logging.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization` header was sent, or it was blank
    #[error("Authorization header is expected.")]
    MissingHeader,

    /// The `Authorization` header does not use the `Bearer` scheme
    #[error("Authorization header must start with 'Bearer'.")]
    InvalidScheme,

    /// The `Authorization` header names the scheme but carries no token
    #[error("Token not found.")]
    MissingToken,

    /// The `Authorization` header has more than a scheme and a token
    #[error("Authorization header must be bearer token.")]
    NotBearerToken,

    /// The token could not be decoded far enough to select a key
    #[error("Unable to parse authentication token.")]
    MalformedToken(#[source] JwtVerifyError),

    /// The token header does not name a key
    #[error("Authorization malformed.")]
    MissingKeyId,

    /// No key in the identity provider's key set matches the token
    #[error("Unable to find the appropriate key.")]
    UnknownKey,

    /// The token has expired
    #[error("Token expired.")]
    TokenExpired,

    /// The token was not issued by the expected issuer for the expected audience
    #[error("Incorrect claims. Please check the audience and issuer.")]
    IncorrectClaims(#[source] ClaimsRejected),

    /// The token failed verification for any other reason
    #[error("Unable to parse authentication token.")]
    InvalidToken(#[source] JwtVerifyError),

    /// The identity provider's key set could not be obtained
    #[error("signing keys unavailable")]
    KeySetUnavailable(#[from] KeySetError),
}

impl AuthError {
    /// The HTTP status code to answer with
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidToken(_) => StatusCode::BAD_REQUEST,
            Self::KeySetUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// A short machine-readable reason
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingHeader => "authorization_header_missing",
            Self::TokenExpired => "token_expired",
            Self::IncorrectClaims(_) => "invalid_claims",
            Self::KeySetUnavailable(_) => "server_error",
            _ => "invalid_header",
        }
    }

    /// Whether the failure lies with the server rather than the credentials
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// A description safe to return to the client
    ///
    /// Server-side failures are described generically.
    #[must_use]
    pub fn description(&self) -> String {
        if self.is_server_error() {
            String::from("Internal Error")
        } else {
            self.to_string()
        }
    }
}

/// Settings for validating tokens issued by an Auth0 tenant
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct ValidatorConfig {
    /// The tenant domain, such as `example.auth0.com`
    pub domain: String,
    /// The API identifier expected in the `aud` claim
    pub audience: String,
    /// The only signing algorithm accepted
    pub algorithm: jwa::Algorithm,
    /// The grace period applied to `exp` and `nbf`
    pub leeway: Duration,
}

impl ValidatorConfig {
    /// Settings for the given tenant and API, accepting `RS256` with no leeway
    pub fn new(domain: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            audience: audience.into(),
            algorithm: jwa::Algorithm::RS256,
            leeway: Duration::ZERO,
        }
    }

    /// Sets the accepted signing algorithm
    pub fn with_algorithm(self, algorithm: jwa::Algorithm) -> Self {
        Self { algorithm, ..self }
    }

    /// Sets the grace period applied to `exp` and `nbf`
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// The expected `iss` claim, `https://{domain}/`
    pub fn issuer(&self) -> jwt::Issuer {
        jwt::Issuer::new(format!("https://{}/", self.domain))
    }

    /// The location of the tenant's published key set
    #[must_use]
    pub fn jwks_url(&self) -> String {
        format!("https://{}/.well-known/jwks.json", self.domain)
    }
}

/// Authenticates bearer tokens against an identity provider's key set
#[derive(Clone)]
#[must_use]
pub struct TokenValidator {
    keys: KeySetCache,
    validator: jwt::CoreValidator,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("keys", &self.keys)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Constructs a validator for the given settings over a key set cache
    pub fn new(config: &ValidatorConfig, keys: KeySetCache) -> Self {
        let validator = jwt::CoreValidator::default()
            .add_approved_algorithm(config.algorithm)
            .add_allowed_audience(jwt::Audience::new(config.audience.clone()))
            .require_issuer(config.issuer())
            .with_leeway(config.leeway);

        Self {
            keys,
            validator,
            clock: Arc::new(System),
        }
    }

    /// Judges token lifetimes by the given clock
    pub fn with_clock(self, clock: impl Clock + Send + Sync + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
            ..self
        }
    }

    /// The key set cache consulted for signing keys
    pub fn keys(&self) -> &KeySetCache {
        &self.keys
    }

    /// Extracts the bearer token from the value of an `Authorization` header
    ///
    /// # Errors
    ///
    /// Fails if the header is absent or blank, does not use the `Bearer`
    /// scheme (which is case-sensitive), or does not carry exactly one token.
    pub fn bearer_token(header: Option<&str>) -> Result<&JwtRef, AuthError> {
        let mut parts = header.unwrap_or_default().split_whitespace();

        let scheme = parts.next().ok_or(AuthError::MissingHeader)?;
        if scheme != "Bearer" {
            return Err(AuthError::InvalidScheme);
        }

        let token = parts.next().ok_or(AuthError::MissingToken)?;
        if parts.next().is_some() {
            return Err(AuthError::NotBearerToken);
        }

        Ok(JwtRef::from_str(token))
    }

    /// Authenticates the value of an `Authorization` header
    ///
    /// # Errors
    ///
    /// See [`AuthError`] for the failure cases.
    pub async fn authenticate<C>(&self, header: Option<&str>) -> Result<C, AuthError>
    where
        C: for<'de> Deserialize<'de> + jwt::CoreClaims,
    {
        let token = Self::bearer_token(header)?;
        self.verify(token).await
    }

    /// Verifies a bearer token, producing its claims
    ///
    /// # Errors
    ///
    /// See [`AuthError`] for the failure cases.
    pub async fn verify<C>(&self, token: &JwtRef) -> Result<C, AuthError>
    where
        C: for<'de> Deserialize<'de> + jwt::CoreClaims,
    {
        let decomposed: jwt::Decomposed = token.decompose().map_err(|err| {
            let error: &dyn std::error::Error = &err;
            tracing::debug!(error, "unable to decompose token");
            AuthError::MalformedToken(err)
        })?;

        let kid = decomposed.kid().map(ToOwned::to_owned).ok_or_else(|| {
            tracing::debug!("token header has no kid");
            AuthError::MissingKeyId
        })?;

        let key = self.keys.get(&kid).await?.ok_or(AuthError::UnknownKey)?;

        let alg = jwt::HasAlgorithm::alg(&decomposed);
        let validated: jwt::Validated<C> = decomposed
            .verify_with_clock(&key, &self.validator, &self.clock)
            .map_err(|err| {
                let error: &dyn std::error::Error = &err;
                tracing::debug!(error, %kid, %alg, "token rejected");
                classify(err)
            })?;

        let (_, claims) = validated.extract();
        Ok(claims)
    }
}

fn classify(err: JwtVerifyError) -> AuthError {
    match err {
        JwtVerifyError::Claims(ClaimsRejected::TokenExpired) => AuthError::TokenExpired,
        JwtVerifyError::Claims(
            rejected @ (ClaimsRejected::InvalidAudience
            | ClaimsRejected::InvalidIssuer
            | ClaimsRejected::MissingRequiredClaim("aud" | "iss")),
        ) => AuthError::IncorrectClaims(rejected),
        err => AuthError::InvalidToken(err),
    }
}
