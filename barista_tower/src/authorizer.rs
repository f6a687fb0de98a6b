use std::{fmt, marker::PhantomData};

use barista::jwt::CoreClaims;
use barista_oauth2::{
    Claims as Auth0Claims, HasPermissions, Permission, PermissionChecker, TokenValidator,
};
use http_body::Body;
use tower_http::{
    auth::AsyncRequireAuthorizationLayer, validate_request::ValidateRequestHeaderLayer,
};

use crate::{OnAuthError, TerseErrorHandler, VerifyJwt, VerifyPermission};

/// Builder for the layers that authenticate bearer tokens and authorize
/// access based on granted permissions
///
/// A protected route wraps its handler in a permission layer, and that in a
/// JWT layer, so that the token is verified before the permission is
/// checked and neither failure reaches the handler:
///
/// ```ignore
/// post(create_drink)
///     .layer(authorizer.permission_layer(Permission::from_static("post:drinks")))
///     .layer(authorizer.jwt_layer())
/// ```
pub struct Authorizer<Claims, OnError> {
    validator: TokenValidator,
    on_error: OnError,
    _claim: PhantomData<fn() -> Claims>,
}

impl<Claims, OnError> Clone for Authorizer<Claims, OnError>
where
    OnError: Clone,
{
    fn clone(&self) -> Self {
        Self {
            validator: self.validator.clone(),
            on_error: self.on_error.clone(),
            _claim: PhantomData,
        }
    }
}

impl<Claims, OnError> fmt::Debug for Authorizer<Claims, OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("validator", &self.validator)
            .field("on_error", &self.on_error)
            .finish()
    }
}

impl Authorizer<Auth0Claims, ()> {
    /// Constructs an authorizer that verifies tokens with `validator` and
    /// expects Auth0 claims
    ///
    /// An error handler must be attached before any layers can be built.
    #[inline]
    pub fn new(validator: TokenValidator) -> Self {
        Self {
            validator,
            on_error: (),
            _claim: PhantomData,
        }
    }
}

impl<OnError> Authorizer<Auth0Claims, OnError> {
    /// Verification will produce the given custom claims object
    #[inline]
    pub fn with_claims<C>(self) -> Authorizer<C, OnError> {
        Authorizer {
            validator: self.validator,
            on_error: self.on_error,
            _claim: PhantomData,
        }
    }
}

impl<Claims> Authorizer<Claims, ()> {
    /// Attaches a custom error handler to generate responses
    /// in the event of a verification failure
    #[inline]
    pub fn with_error_handler<E>(self, on_error: E) -> Authorizer<Claims, E> {
        Authorizer {
            validator: self.validator,
            on_error,
            _claim: self._claim,
        }
    }

    /// Attaches the default terse error handler: [`TerseErrorHandler`]
    ///
    /// This error handler generates responses containing the relevant
    /// status code and challenge with an empty body
    #[inline]
    pub fn with_terse_error_handler<ResBody: Body + Default>(
        self,
    ) -> Authorizer<Claims, TerseErrorHandler<ResBody>> {
        Authorizer {
            validator: self.validator,
            on_error: TerseErrorHandler::new(),
            _claim: self._claim,
        }
    }
}

impl<Claims, OnError> Authorizer<Claims, OnError>
where
    OnError: OnAuthError + Clone,
{
    /// Layer that verifies the bearer token in the `Authorization` header
    ///
    /// The extracted `Claims` will be made available through
    /// [`Request::extensions`][http::Request::extensions].
    pub fn jwt_layer(&self) -> AsyncRequireAuthorizationLayer<VerifyJwt<Claims, OnError>>
    where
        Claims: for<'de> serde::Deserialize<'de> + CoreClaims + Clone + Send + Sync + 'static,
    {
        AsyncRequireAuthorizationLayer::new(VerifyJwt::new(
            self.validator.clone(),
            self.on_error.clone(),
        ))
    }

    /// Layer that requires the verified claims to grant `permission`
    ///
    /// Must run inside [`jwt_layer`](Self::jwt_layer).
    pub fn permission_layer(
        &self,
        permission: Permission,
    ) -> ValidateRequestHeaderLayer<VerifyPermission<Claims, OnError>>
    where
        Claims: HasPermissions + Send + Sync + 'static,
    {
        ValidateRequestHeaderLayer::custom(VerifyPermission::new(
            PermissionChecker::new(permission),
            self.on_error.clone(),
        ))
    }
}
