use barista::{
    clock::UnixTime,
    jwt::{self, Audiences},
};
use serde::{Deserialize, Serialize};

use crate::{HasPermissions, Permissions};

/// The claims of an Auth0 access token
///
/// Registered claims are exposed through [`jwt::CoreClaims`]. Every other
/// member of the payload is kept in [`extra`](Self::extra), so that
/// serializing a claim set reproduces the token's decoded payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<jwt::Issuer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<jwt::Subject>,
    #[serde(default, skip_serializing_if = "Audiences::is_empty")]
    aud: Audiences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nbf: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    azp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    permissions: Option<Permissions>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    /// The time at which the token was issued
    #[must_use]
    pub fn iat(&self) -> Option<UnixTime> {
        self.iat
    }

    /// The client the token was issued to
    #[must_use]
    pub fn azp(&self) -> Option<&str> {
        self.azp.as_deref()
    }

    /// The space-delimited OAuth2 `scope` claim
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Payload members that are not otherwise modeled
    #[must_use]
    pub fn extra(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.extra
    }

    /// Sets the `permissions` claim
    pub fn with_permissions(self, permissions: Permissions) -> Self {
        Self {
            permissions: Some(permissions),
            ..self
        }
    }
}

impl jwt::CoreClaims for Claims {
    #[inline]
    fn nbf(&self) -> Option<UnixTime> {
        self.nbf
    }

    #[inline]
    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    #[inline]
    fn aud(&self) -> &Audiences {
        &self.aud
    }

    #[inline]
    fn iss(&self) -> Option<&jwt::IssuerRef> {
        self.iss.as_deref()
    }

    #[inline]
    fn sub(&self) -> Option<&jwt::SubjectRef> {
        self.sub.as_deref()
    }
}

impl HasPermissions for Claims {
    #[inline]
    fn permissions(&self) -> Option<&Permissions> {
        self.permissions.as_ref()
    }
}
