use std::{fmt, future::Future, marker::PhantomData, pin::Pin};

use barista::jwt::CoreClaims;
use barista_oauth2::{AuthError, PermissionError, TokenValidator};
use http::{header, Request, Response};
use tower_http::auth::AsyncAuthorizeRequest;

use crate::{util, TerseErrorHandler};

/// Authenticates the bearer token in the `Authorization` header
///
/// On success, the token's `Claims` are inserted into the request
/// extensions for later stages and handlers. On failure, the response is
/// produced by the `OnError` handler and the request goes no further.
pub struct VerifyJwt<Claims, OnError> {
    validator: TokenValidator,
    on_error: OnError,
    _claim: PhantomData<fn() -> Claims>,
}

impl<Claims, OnError> Clone for VerifyJwt<Claims, OnError>
where
    OnError: Clone,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            validator: self.validator.clone(),
            on_error: self.on_error.clone(),
            _claim: PhantomData,
        }
    }
}

impl<Claims, OnError> fmt::Debug for VerifyJwt<Claims, OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VerifyJwt")
            .field("validator", &self.validator)
            .field("on_error", &self.on_error)
            .finish()
    }
}

impl<Claims, OnError> VerifyJwt<Claims, OnError> {
    #[inline]
    pub(crate) fn new(validator: TokenValidator, on_error: OnError) -> Self {
        Self {
            validator,
            on_error,
            _claim: PhantomData,
        }
    }
}

impl<Claims, OnError, ReqBody> AsyncAuthorizeRequest<ReqBody> for VerifyJwt<Claims, OnError>
where
    OnError: OnAuthError + Clone + Send + Sync + 'static,
    Claims: for<'de> serde::Deserialize<'de> + CoreClaims + Clone + Send + Sync + 'static,
    ReqBody: Send + 'static,
{
    type RequestBody = ReqBody;
    type ResponseBody = OnError::Body;
    type Future = Pin<
        Box<
            dyn Future<Output = Result<Request<ReqBody>, Response<Self::ResponseBody>>> + Send,
        >,
    >;

    fn authorize(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let validator = self.validator.clone();
        let on_error = self.on_error.clone();

        Box::pin(async move {
            let header = match request.headers().get(header::AUTHORIZATION) {
                Some(value) => match value.to_str() {
                    Ok(value) => Some(value.to_owned()),
                    Err(_) => {
                        tracing::debug!("authorization header is not visible ASCII");
                        return Err(on_error.on_auth_error(AuthError::InvalidScheme));
                    }
                },
                None => None,
            };

            let claims = validator
                .authenticate::<Claims>(header.as_deref())
                .await
                .map_err(|err| on_error.on_auth_error(err))?;

            tracing::trace!("jwt was valid");
            request.extensions_mut().insert(claims);

            Ok(request)
        })
    }
}

/// Handler for responding to failures while authenticating and authorizing
/// a request
pub trait OnAuthError {
    /// The body type returned on an error
    type Body;

    /// Response when the bearer token was missing, malformed, or rejected
    fn on_auth_error(&self, error: AuthError) -> Response<Self::Body>;

    /// Response when the token does not grant the required permission
    fn on_permission_error(&self, error: PermissionError) -> Response<Self::Body>;

    /// Response when a permission check runs without verified claims in the
    /// request extensions
    ///
    /// This only happens when the permission stage is not preceded by the
    /// JWT stage.
    fn on_missing_claims(&self) -> Response<Self::Body>;
}

macro_rules! delegate_impls {
    ($($ty:ty)*) => {
        $(
            impl<T> OnAuthError for $ty
            where
                T: OnAuthError + ?Sized,
            {
                type Body = T::Body;

                fn on_auth_error(&self, error: AuthError) -> Response<Self::Body> {
                    T::on_auth_error(self, error)
                }

                fn on_permission_error(&self, error: PermissionError) -> Response<Self::Body> {
                    T::on_permission_error(self, error)
                }

                fn on_missing_claims(&self) -> Response<Self::Body> {
                    T::on_missing_claims(self)
                }
            }
        )*
    }
}

delegate_impls!(
    &'_ T
    Box<T>
    std::rc::Rc<T>
    std::sync::Arc<T>
);

impl<ResBody> OnAuthError for TerseErrorHandler<ResBody>
where
    ResBody: http_body::Body + Default,
{
    type Body = ResBody;

    #[inline]
    fn on_auth_error(&self, error: AuthError) -> Response<Self::Body> {
        tracing::debug!(status = error.status_code().as_u16(), "JWT validation failed: {error}");
        util::auth_failure(&error, ResBody::default())
    }

    #[inline]
    fn on_permission_error(&self, error: PermissionError) -> Response<Self::Body> {
        tracing::debug!("permission check failed: {error}");
        util::permission_failure(&error, ResBody::default())
    }

    #[inline]
    fn on_missing_claims(&self) -> Response<Self::Body> {
        tracing::error!("permission check ran without verified claims");
        let mut resp = Response::new(ResBody::default());
        *resp.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
        resp
    }
}
