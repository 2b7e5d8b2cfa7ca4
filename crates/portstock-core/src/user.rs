//! # Users and Roles
//!
//! Accounts that can sign in to the inventory. Password hashing lives in
//! the web crate; this module only validates the plaintext policy and
//! carries the stored hash string.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::UserId;

/// Access level, ordered by privilege.
///
/// The derived `Ord` follows declaration order
/// (`Viewer < Storekeeper < Admin`), so `role >= Role::Storekeeper` is a
/// complete access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only: stock, registers and reports.
    Viewer,
    /// Records receipts, issues and returns; maintains the item catalog.
    Storekeeper,
    /// Everything, including user and department administration.
    Admin,
}

impl Role {
    /// Every role, lowest privilege first.
    pub const ALL: [Role; 3] = [Self::Viewer, Self::Storekeeper, Self::Admin];

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Storekeeper => "storekeeper",
            Self::Admin => "admin",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Viewer => "Viewer",
            Self::Storekeeper => "Storekeeper",
            Self::Admin => "Administrator",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "storekeeper" => Ok(Self::Storekeeper),
            "admin" => Ok(Self::Admin),
            _ => Err(ValidationError::UnknownRole(s.to_string())),
        }
    }
}

/// Login name: 3-32 characters of `[a-z0-9._-]`, lowercased on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validate and normalize a username.
    pub fn new(input: &str) -> Result<Self, ValidationError> {
        let name = input.trim().to_ascii_lowercase();
        let valid = (3..=32).contains(&name.len())
            && name.chars().all(|c| {
                c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')
            });
        if valid {
            Ok(Self(name))
        } else {
            Err(ValidationError::InvalidUsername(input.to_string()))
        }
    }

    /// The normalized name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Username> for String {
    fn from(name: Username) -> Self {
        name.0
    }
}

/// Check a plaintext password against the policy: 8-128 characters and
/// not entirely whitespace.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if !(8..=128).contains(&len) || password.trim().is_empty() {
        return Err(ValidationError::WeakPassword);
    }
    Ok(())
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: Username,
    /// Display name, printed on vouchers.
    pub full_name: String,
    /// Access level.
    pub role: Role,
    /// Encoded password hash (`pbkdf2-sha256$...`).
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Inactive users cannot sign in.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last profile change.
    pub updated_at: DateTime<Utc>,
    /// Last successful sign-in.
    pub last_login_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::Viewer < Role::Storekeeper);
        assert!(Role::Storekeeper < Role::Admin);
        assert!(Role::Admin >= Role::Storekeeper);
    }

    #[test]
    fn role_roundtrips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn username_is_lowercased() {
        assert_eq!(Username::new("  J.Silva ").unwrap().as_str(), "j.silva");
    }

    #[test]
    fn username_rejects_bad_input() {
        assert!(Username::new("ab").is_err());
        assert!(Username::new("a b c").is_err());
        assert!(Username::new("admin'--").is_err());
        assert!(Username::new(&"x".repeat(33)).is_err());
    }

    #[test]
    fn password_policy() {
        assert!(validate_password("correct horse").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password("          ").is_err());
        assert!(validate_password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let now = Utc::now();
        let user = UserRecord {
            id: UserId::new(),
            username: Username::new("storekeeper1").unwrap(),
            full_name: "Store Keeper".into(),
            role: Role::Storekeeper,
            password_hash: "pbkdf2-sha256$1$c2FsdA$aGFzaA".into(),
            active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("pbkdf2"));
    }
}
