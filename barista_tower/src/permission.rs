use std::{fmt, marker::PhantomData};

use barista_oauth2::{HasPermissions, PermissionChecker};
use http::{Request, Response};
use tower_http::validate_request::ValidateRequest;

use crate::OnAuthError;

/// Checks the claims left in the request extensions by
/// [`VerifyJwt`](crate::VerifyJwt) for a single required permission
pub struct VerifyPermission<Claims, OnError> {
    checker: PermissionChecker,
    on_error: OnError,
    _claim: PhantomData<fn() -> Claims>,
}

impl<Claims, OnError> Clone for VerifyPermission<Claims, OnError>
where
    OnError: Clone,
{
    fn clone(&self) -> Self {
        Self {
            checker: self.checker.clone(),
            on_error: self.on_error.clone(),
            _claim: PhantomData,
        }
    }
}

impl<Claims, OnError> fmt::Debug for VerifyPermission<Claims, OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VerifyPermission")
            .field("checker", &self.checker)
            .field("on_error", &self.on_error)
            .finish()
    }
}

impl<Claims, OnError> VerifyPermission<Claims, OnError> {
    #[inline]
    pub(crate) fn new(checker: PermissionChecker, on_error: OnError) -> Self {
        Self {
            checker,
            on_error,
            _claim: PhantomData,
        }
    }
}

impl<Claims, OnError, ReqBody> ValidateRequest<ReqBody> for VerifyPermission<Claims, OnError>
where
    OnError: OnAuthError,
    Claims: HasPermissions + Send + Sync + 'static,
{
    type ResponseBody = OnError::Body;

    fn validate(
        &mut self,
        request: &mut Request<ReqBody>,
    ) -> Result<(), Response<Self::ResponseBody>> {
        let claims = request
            .extensions()
            .get::<Claims>()
            .ok_or_else(|| self.on_error.on_missing_claims())?;

        tracing::trace!(permission.required = %self.checker.required(), "checking permission");

        self.checker
            .check(claims)
            .map_err(|err| self.on_error.on_permission_error(err))
    }
}
