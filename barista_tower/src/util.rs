//! Utilities for generating HTTP responses on authorization failures

use barista_oauth2::{AuthError, PermissionError, PermissionRef};
use http::{header, HeaderValue, Response};

/// Builds a response for a failed authentication, carrying the status code
/// of the error and, for client errors, a `www-authenticate` header
///
/// The prepared response will have the form:
///
/// ```http
/// HTTP/1.1 401 Unauthorized
/// www-authenticate: Bearer error="invalid_token" error_description="{description}"
/// ```
pub fn auth_failure<Body>(error: &AuthError, body: Body) -> Response<Body> {
    let mut resp = Response::new(body);
    *resp.status_mut() = error.status_code();
    if !error.is_server_error() {
        resp.headers_mut()
            .insert(header::WWW_AUTHENTICATE, invalid_token(&error.to_string()));
    }
    resp
}

/// Builds a response for a failed permission check, carrying the status
/// code of the error and a `www-authenticate` header
///
/// When the token carried permissions but not the required one, the header
/// names the permission that was required:
///
/// ```http
/// HTTP/1.1 401 Unauthorized
/// www-authenticate: Bearer error="insufficient_scope" error_description="{description}" scope="post:drinks"
/// ```
pub fn permission_failure<Body>(error: &PermissionError, body: Body) -> Response<Body> {
    let required = match error {
        PermissionError::PermissionNotFound { required } => Some(&**required),
        PermissionError::MissingPermissionsClaim => None,
    };

    let mut resp = Response::new(body);
    *resp.status_mut() = error.status_code();
    resp.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        insufficient_scope(&error.to_string(), required),
    );
    resp
}

/// The `www-authenticate` value for a rejected token
///
/// The description is escaped to make sure it is header-friendly, and
/// omitted if empty.
pub fn invalid_token(description: &str) -> HeaderValue {
    const BARE: &str = r#"Bearer error="invalid_token""#;

    if description.is_empty() {
        HeaderValue::from_static(BARE)
    } else {
        HeaderValue::try_from(format!(
            r#"{BARE} error_description="{}""#,
            description.escape_default()
        ))
        .unwrap_or_else(|_| HeaderValue::from_static(BARE))
    }
}

/// The `www-authenticate` value for a token lacking a required permission
pub fn insufficient_scope(description: &str, required: Option<&PermissionRef>) -> HeaderValue {
    const BARE: &str = r#"Bearer error="insufficient_scope""#;

    let mut value = String::from(BARE);
    if !description.is_empty() {
        value.push_str(&format!(
            r#" error_description="{}""#,
            description.escape_default()
        ));
    }
    // A permission is printable ASCII without `\` or `"`, so it never needs
    // escaping inside the quoted parameter
    if let Some(required) = required {
        value.push_str(&format!(r#" scope="{required}""#));
    }

    HeaderValue::try_from(value).unwrap_or_else(|_| HeaderValue::from_static(BARE))
}
