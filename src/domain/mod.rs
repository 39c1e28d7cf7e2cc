//! Domain primitives shared by the HTTP layer, services and the importer.
//!
//! Roles are a closed set with explicit capability checks; field validation
//! lives in [`validation`] and runs before anything is persisted.

pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Access level of an account.
///
/// # Examples
///
/// ```rust
/// use yamdb::domain::Role;
///
/// let role: Role = "moderator".parse().unwrap();
/// assert!(role.can_moderate());
/// assert!(!role.is_admin());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Self; 3] = [Self::User, Self::Moderator, Self::Admin];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    #[must_use]
    pub const fn is_moderator(&self) -> bool {
        matches!(self, Self::Moderator)
    }

    /// Moderators and admins may edit or delete content written by others.
    #[must_use]
    pub const fn can_moderate(&self) -> bool {
        matches!(self, Self::Moderator | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" is not a valid choice.", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// The authenticated account behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub is_superuser: bool,
}

impl CurrentUser {
    /// Superusers are always admins regardless of their stored role.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.is_superuser || self.role.is_admin()
    }

    #[must_use]
    pub const fn is_moderator(&self) -> bool {
        self.role.is_moderator()
    }

    /// Whether this user may change or remove content owned by `author_id`.
    #[must_use]
    pub const fn can_edit(&self, author_id: i32) -> bool {
        self.id == author_id || self.is_admin() || self.role.can_moderate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, is_superuser: bool) -> CurrentUser {
        CurrentUser {
            id: 7,
            username: "someone".to_string(),
            role,
            is_superuser,
        }
    }

    #[test]
    fn test_role_parse_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("Admin".parse::<Role>().is_err());
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_superuser_implies_admin() {
        assert!(user(Role::User, true).is_admin());
        assert!(user(Role::Admin, false).is_admin());
        assert!(!user(Role::Moderator, false).is_admin());
    }

    #[test]
    fn test_can_edit() {
        assert!(user(Role::User, false).can_edit(7));
        assert!(!user(Role::User, false).can_edit(8));
        assert!(user(Role::Moderator, false).can_edit(8));
        assert!(user(Role::Admin, false).can_edit(8));
        assert!(user(Role::User, true).can_edit(8));
    }

    #[test]
    fn test_role_serde() {
        let json = serde_json::to_string(&Role::Moderator).unwrap();
        assert_eq!(json, "\"moderator\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}
