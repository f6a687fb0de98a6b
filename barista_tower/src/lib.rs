//! Middleware for authenticating bearer tokens and enforcing permissions in
//! `tower_http` and the rest of the ecosystem, including `axum`
//!
//! Protection is applied per route in two stages. The JWT stage
//! ([`Authorizer::jwt_layer`]) verifies the bearer token with a
//! [`TokenValidator`](barista_oauth2::TokenValidator) and leaves the claims
//! in the request extensions. The permission stage
//! ([`Authorizer::permission_layer`]) checks those claims for one required
//! permission. A failure at either stage is answered by an [`OnAuthError`]
//! handler and the request goes no further.
//!
//! ```
//! # use axum::{handler::Handler, routing::{get, post}, Extension};
//! use barista_oauth2::{Claims, KeySetCache, Permission, TokenValidator, ValidatorConfig};
//! use barista_tower::Authorizer;
//!
//! # fn build(jwks: barista::Jwks) -> axum::Router {
//! let config = ValidatorConfig::new("example.auth0.com", "coffeeshop");
//! let validator = TokenValidator::new(&config, KeySetCache::from_jwks(jwks));
//! let authorizer = Authorizer::new(validator).with_terse_error_handler::<axum::body::Body>();
//!
//! let app = axum::Router::new().route(
//!     "/drinks",
//!     get(list_drinks).post(
//!         create_drink
//!             .layer(authorizer.permission_layer(Permission::from_static("post:drinks")))
//!             .layer(authorizer.jwt_layer()),
//!     ),
//! );
//! # app
//! # }
//!
//! async fn list_drinks() {}
//!
//! async fn create_drink(Extension(claims): Extension<Claims>) {
//!     // Only reached with a verified token granting `post:drinks`
//! #   let _ = claims;
//! }
//! ```

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

use std::{fmt, marker::PhantomData};

mod authorizer;
mod jwt;
mod permission;
pub mod util;

pub use crate::authorizer::Authorizer;
pub use crate::jwt::{OnAuthError, VerifyJwt};
pub use crate::permission::VerifyPermission;

/// Responds to failures with the relevant status code, a `www-authenticate`
/// challenge, and an empty body
pub struct TerseErrorHandler<ResBody> {
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> TerseErrorHandler<ResBody> {
    /// Instantiates a new instance over a given body type
    #[inline]
    pub fn new() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> fmt::Debug for TerseErrorHandler<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("TerseErrorHandler")
    }
}

impl<ResBody> Default for TerseErrorHandler<ResBody> {
    #[inline]
    fn default() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Clone for TerseErrorHandler<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Copy for TerseErrorHandler<ResBody> {}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        handler::Handler,
        http::{header, Request, StatusCode},
        routing::get,
        Extension, Router,
    };
    use barista::{
        clock::{Clock, System},
        jwa, jwk, jwt, Jwks, Jwt,
    };
    use barista_oauth2::{Claims, KeySetCache, Permission, TokenValidator, ValidatorConfig};
    use color_eyre::Result;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;

    const KEY_ID: &str = "coffeeshop-test-key";
    const DOMAIN: &str = "barista.example.auth0.com";
    const AUDIENCE: &str = "coffeeshop";
    const JWKS: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../barista/data/rsa/jwks.json"
    ));
    const PRIVATE_KEY_DER: &[u8] = include_bytes!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../barista/data/rsa/private.der"
    ));

    fn token(permissions: Option<&[&str]>) -> Result<Jwt> {
        let key = jwa::rsa::PrivateKey::from_der(PRIVATE_KEY_DER)?;
        let headers =
            jwt::BasicHeaders::with_key_id(jwa::Algorithm::RS256, jwk::KeyId::from_static(KEY_ID));

        let mut payload = json!({
            "iss": format!("https://{DOMAIN}/"),
            "sub": "auth0|barista",
            "aud": AUDIENCE,
            "exp": System.now().0 + 3600,
        });
        if let Some(permissions) = permissions {
            payload["permissions"] = json!(permissions);
        }

        Ok(Jwt::try_from_parts_with_signature(&headers, &payload, &key)?)
    }

    fn validator() -> Result<TokenValidator> {
        let jwks: Jwks = serde_json::from_str(JWKS)?;
        let config = ValidatorConfig::new(DOMAIN, AUDIENCE);
        Ok(TokenValidator::new(&config, KeySetCache::from_jwks(jwks)))
    }

    fn authorizer() -> Result<Authorizer<Claims, TerseErrorHandler<Body>>> {
        Ok(Authorizer::new(validator()?).with_terse_error_handler())
    }

    async fn whoami(Extension(claims): Extension<Claims>) -> String {
        use barista::jwt::CoreClaims;
        claims.sub().map(|s| s.to_string()).unwrap_or_default()
    }

    fn app() -> Result<Router> {
        let authorizer = authorizer()?;
        let detail = Permission::from_static("get:drinks-detail");
        Ok(Router::new()
            .route(
                "/drinks-detail",
                get(whoami
                    .layer(authorizer.permission_layer(detail.clone()))
                    .layer(authorizer.jwt_layer())),
            )
            .route(
                "/unguarded",
                get(whoami.layer(authorizer.permission_layer(detail))),
            ))
    }

    fn request(uri: &str, token: Option<&Jwt>) -> Result<Request<Body>> {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token.as_str()));
        }
        Ok(builder.body(Body::empty())?)
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() -> Result<()> {
        let resp = app()?.oneshot(request("/drinks-detail", None)?).await?;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers()[header::WWW_AUTHENTICATE],
            r#"Bearer error="invalid_token" error_description="Authorization header is expected.""#
        );
        Ok(())
    }

    #[tokio::test]
    async fn granted_permission_reaches_handler_with_claims() -> Result<()> {
        let token = token(Some(&["get:drinks-detail"]))?;
        let resp = app()?
            .oneshot(request("/drinks-detail", Some(&token))?)
            .await?;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
        assert_eq!(&body[..], b"auth0|barista");
        Ok(())
    }

    #[tokio::test]
    async fn absent_permission_is_unauthorized() -> Result<()> {
        let token = token(Some(&["post:drinks"]))?;
        let resp = app()?
            .oneshot(request("/drinks-detail", Some(&token))?)
            .await?;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers()[header::WWW_AUTHENTICATE],
            r#"Bearer error="insufficient_scope" error_description="Permission not found." scope="get:drinks-detail""#
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_permissions_claim_is_a_bad_request() -> Result<()> {
        let token = token(None)?;
        let resp = app()?
            .oneshot(request("/drinks-detail", Some(&token))?)
            .await?;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn permission_stage_alone_is_a_server_error() -> Result<()> {
        let token = token(Some(&["get:drinks-detail"]))?;
        let resp = app()?.oneshot(request("/unguarded", Some(&token))?).await?;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }

    #[tokio::test]
    async fn custom_error_handler_decides_response() -> Result<()> {
        #[derive(Clone, Debug)]
        struct Teapot;

        impl OnAuthError for Teapot {
            type Body = Body;

            fn on_auth_error(
                &self,
                error: barista_oauth2::AuthError,
            ) -> http::Response<Self::Body> {
                let mut resp = http::Response::new(Body::from(error.to_string()));
                *resp.status_mut() = StatusCode::IM_A_TEAPOT;
                resp
            }

            fn on_permission_error(
                &self,
                _: barista_oauth2::PermissionError,
            ) -> http::Response<Self::Body> {
                unreachable!()
            }

            fn on_missing_claims(&self) -> http::Response<Self::Body> {
                unreachable!()
            }
        }

        let authorizer =
            Authorizer::new(validator()?).with_error_handler(std::sync::Arc::new(Teapot));
        let app = Router::new().route("/", get(whoami.layer(authorizer.jwt_layer())));

        let resp = app
            .oneshot(
                Request::get("/")
                    .header(header::AUTHORIZATION, "Token abc")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
        assert_eq!(&body[..], b"Authorization header must start with 'Bearer'.");
        Ok(())
    }
}
