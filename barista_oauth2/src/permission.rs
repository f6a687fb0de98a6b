//! Permissions granted by the identity provider and the check that gates
//! each protected endpoint

use aliri_braid::braid;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An invalid permission string
#[derive(Debug, Error)]
pub enum InvalidPermission {
    /// The permission was the empty string
    #[error("permission cannot be empty")]
    EmptyString,
    /// The permission contained an invalid byte
    #[error("invalid permission byte at position {position}: 0x{value:02x}")]
    InvalidByte {
        /// The index in the permission where the invalid byte was found
        position: usize,
        /// The invalid byte value
        value: u8,
    },
}

aliri_braid::from_infallible!(InvalidPermission);

/// A permission string such as `post:drinks`, as granted in the
/// `permissions` claim of an Auth0 access token
///
/// A permission must be composed of printable ASCII characters excluding
/// ` ` (space), `"` (double quote), and `\` (backslash).
#[braid(serde, validator, ref_doc = "A borrowed reference to a [`Permission`]")]
pub struct Permission;

impl aliri_braid::Validator for Permission {
    type Error = InvalidPermission;

    fn validate(s: &str) -> Result<(), Self::Error> {
        if s.is_empty() {
            Err(InvalidPermission::EmptyString)
        } else if let Some((position, &value)) = s
            .as_bytes()
            .iter()
            .enumerate()
            .find(|(_, &b)| b <= 0x20 || b == 0x22 || b == 0x5C || 0x7F <= b)
        {
            Err(InvalidPermission::InvalidByte { position, value })
        } else {
            Ok(())
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PermissionsDto {
    String(String),
    Array(Vec<String>),
}

impl From<PermissionsDto> for Permissions {
    fn from(dto: PermissionsDto) -> Self {
        match dto {
            PermissionsDto::String(s) => s.split_whitespace().collect(),
            PermissionsDto::Array(arr) => Self(arr),
        }
    }
}

/// The permissions granted to the bearer of a token, in the order granted
///
/// Deserializes from either a JSON array of strings or a single
/// space-delimited string, and always serializes as an array. Granted
/// entries are kept exactly as issued; an entry that could never be
/// required, such as `"Read Drinks"`, simply matches nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PermissionsDto")]
pub struct Permissions(Vec<String>);

impl Permissions {
    /// Produces an empty permission set
    #[inline]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Whether the given permission was granted
    #[inline]
    #[must_use]
    pub fn contains(&self, permission: &PermissionRef) -> bool {
        self.0.iter().any(|p| p == permission.as_str())
    }

    /// The number of permissions granted
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no permissions were granted
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Produces an iterator of the granted permissions
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<P> FromIterator<P> for Permissions
where
    P: Into<String>,
{
    #[inline]
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = P>,
    {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Indicates that the type may carry a `permissions` claim
pub trait HasPermissions {
    /// The granted permissions, or `None` if the claim is absent
    fn permissions(&self) -> Option<&Permissions>;
}

impl HasPermissions for Permissions {
    #[inline]
    fn permissions(&self) -> Option<&Permissions> {
        Some(self)
    }
}

/// The verified claims do not grant the required permission
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The claims carry no `permissions` claim at all
    #[error("Permissions not included in JWT.")]
    MissingPermissionsClaim,

    /// The `permissions` claim does not include the required permission
    #[error("Permission not found.")]
    PermissionNotFound {
        /// The permission that was required
        required: Permission,
    },
}

impl PermissionError {
    /// The HTTP status code to answer with
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingPermissionsClaim => StatusCode::BAD_REQUEST,
            Self::PermissionNotFound { .. } => StatusCode::UNAUTHORIZED,
        }
    }

    /// A short machine-readable reason
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingPermissionsClaim => "invalid_claims",
            Self::PermissionNotFound { .. } => "unauthorized",
        }
    }
}

/// Checks that verified claims grant one required permission
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct PermissionChecker {
    required: Permission,
}

impl PermissionChecker {
    /// Constructs a checker requiring the given permission
    pub fn new(required: impl Into<Permission>) -> Self {
        Self {
            required: required.into(),
        }
    }

    /// The permission this checker requires
    #[must_use]
    pub fn required(&self) -> &PermissionRef {
        &self.required
    }

    /// Checks the claims for the required permission
    ///
    /// # Errors
    ///
    /// Fails if the claims have no `permissions` claim, or if the claim does
    /// not include the required permission.
    pub fn check<C: HasPermissions + ?Sized>(&self, claims: &C) -> Result<(), PermissionError> {
        let granted = claims
            .permissions()
            .ok_or(PermissionError::MissingPermissionsClaim)?;

        if granted.contains(&self.required) {
            Ok(())
        } else {
            tracing::debug!(
                permission.required = %self.required,
                "required permission not granted"
            );
            Err(PermissionError::PermissionNotFound {
                required: self.required.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;

    const POST_DRINKS: &str = "post:drinks";

    #[test]
    fn rejects_invalid_permissions() {
        assert!(Permission::new(String::new()).is_err());
        assert!(Permission::new("post drinks".to_owned()).is_err());
        assert!(Permission::new("post\"drinks".to_owned()).is_err());
        assert!(Permission::new(POST_DRINKS.to_owned()).is_ok());
    }

    #[test]
    fn granted_permission_passes() -> Result<()> {
        let granted: Permissions = serde_json::from_str(r#"["get:drinks-detail", "post:drinks"]"#)?;
        PermissionChecker::new(Permission::from_static(POST_DRINKS)).check(&granted)?;
        Ok(())
    }

    #[test]
    fn missing_claim_is_a_bad_request() {
        struct NoClaim;
        impl HasPermissions for NoClaim {
            fn permissions(&self) -> Option<&Permissions> {
                None
            }
        }

        let err = PermissionChecker::new(Permission::from_static(POST_DRINKS))
            .check(&NoClaim)
            .unwrap_err();
        assert!(matches!(err, PermissionError::MissingPermissionsClaim));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Permissions not included in JWT.");
    }

    #[test]
    fn absent_permission_is_unauthorized() -> Result<()> {
        let granted: Permissions = serde_json::from_str(r#"["get:drinks-detail"]"#)?;
        let err = PermissionChecker::new(Permission::from_static(POST_DRINKS))
            .check(&granted)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Permission not found.");
        Ok(())
    }

    #[test]
    fn empty_grant_is_unauthorized_not_missing() {
        let err = PermissionChecker::new(Permission::from_static(POST_DRINKS))
            .check(&Permissions::empty())
            .unwrap_err();
        assert!(matches!(err, PermissionError::PermissionNotFound { .. }));
    }

    #[test]
    fn unusual_grants_do_not_hide_the_required_one() -> Result<()> {
        let granted: Permissions =
            serde_json::from_str(r#"["Read Drinks", "café", "", "post:drinks"]"#)?;
        assert_eq!(granted.len(), 4);
        PermissionChecker::new(Permission::from_static(POST_DRINKS)).check(&granted)?;
        Ok(())
    }

    #[test]
    fn matching_is_exact() -> Result<()> {
        let granted: Permissions = serde_json::from_str(r#""post:drinks-extra POST:drinks""#)?;
        assert!(PermissionChecker::new(Permission::from_static(POST_DRINKS))
            .check(&granted)
            .is_err());
        Ok(())
    }
}
