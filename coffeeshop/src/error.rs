//! Failures and how they are rendered
//!
//! Every failure leaves the service as the same JSON envelope:
//!
//! ```json
//! { "success": false, "error": 404, "message": "There are no drinks" }
//! ```
//!
//! [`ErrorMapper`] is the only place that builds these responses, both for
//! handlers (through [`IntoResponse`] on [`ApiError`]) and for the
//! authentication middleware (through [`OnAuthError`]).

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use barista_oauth2::{AuthError, PermissionError};
use barista_tower::{util, OnAuthError};
use serde::Serialize;
use thiserror::Error;

use crate::{model::InputError, store::RepositoryError};

/// Message for requests that match no route
pub const NOT_FOUND: &str = "Resource not found.";

/// A request failed
#[derive(Debug, Error)]
pub enum ApiError {
    /// The bearer token was missing or rejected
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The token does not grant the required permission
    #[error(transparent)]
    Permission(#[from] PermissionError),

    /// The requested resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// The request body was malformed or conflicts with existing data
    #[error("{0}")]
    Validation(String),

    /// The database failed
    #[error("{0}")]
    Storage(String),

    /// The path exists but not with this method
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    /// Any other failure
    #[error("Internal Error")]
    Internal,
}

impl ApiError {
    /// The HTTP status code to answer with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(err) => err.status_code(),
            Self::Permission(err) => err.status_code(),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the client
    pub fn message(&self) -> String {
        match self {
            Self::Auth(err) => err.description(),
            _ => self.to_string(),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(message) => Self::NotFound(message.to_owned()),
            RepositoryError::Conflict(message) => Self::Validation(message),
            RepositoryError::Storage { context, source } => {
                let error: &dyn std::error::Error = &source;
                tracing::error!(error, "{context}");
                Self::Storage(context.to_owned())
            }
        }
    }
}

impl From<InputError> for ApiError {
    #[inline]
    fn from(err: InputError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// The body of every failed response
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    success: bool,
    error: u16,
    message: String,
}

impl ErrorEnvelope {
    /// Describes a failure with the given status
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: status.as_u16(),
            message: message.into(),
        }
    }
}

/// Renders failures as [`ErrorEnvelope`] responses
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorMapper;

impl ErrorMapper {
    /// Renders a failure
    ///
    /// Authentication and permission failures also carry a
    /// `www-authenticate` challenge.
    pub fn render(&self, error: ApiError) -> Response {
        let status = error.status_code();
        let body = self.body(status, error.message());

        let mut resp = match &error {
            ApiError::Auth(err) => util::auth_failure(err, body),
            ApiError::Permission(err) => util::permission_failure(err, body),
            _ => {
                let mut resp = Response::new(body);
                *resp.status_mut() = status;
                resp
            }
        };

        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        resp
    }

    fn body(&self, status: StatusCode, message: String) -> Body {
        match serde_json::to_vec(&ErrorEnvelope::new(status, message)) {
            Ok(bytes) => Body::from(bytes),
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::error!(error, "unable to serialize error envelope");
                Body::empty()
            }
        }
    }
}

impl OnAuthError for ErrorMapper {
    type Body = Body;

    fn on_auth_error(&self, error: AuthError) -> Response {
        if error.is_server_error() {
            let err: &dyn std::error::Error = &error;
            tracing::error!(error = err, "unable to authenticate request");
        } else {
            tracing::debug!(
                status = error.status_code().as_u16(),
                "JWT validation failed: {error}"
            );
        }
        self.render(ApiError::Auth(error))
    }

    fn on_permission_error(&self, error: PermissionError) -> Response {
        tracing::debug!(
            status = error.status_code().as_u16(),
            "permission check failed: {error}"
        );
        self.render(ApiError::Permission(error))
    }

    fn on_missing_claims(&self) -> Response {
        tracing::error!("permission check ran without verified claims");
        self.render(ApiError::Internal)
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        ErrorMapper.render(self)
    }
}
