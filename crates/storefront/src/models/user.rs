//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quantofy_core::{Email, UserId, UserRole};

/// A registered account as persisted in the user list.
///
/// Only the Argon2 hash of the password is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub phone: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

/// The authenticated user held in the session.
///
/// Same fields as [`StoredUser`] without the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&StoredUser> for CurrentUser {
    fn from(user: &StoredUser) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

/// Registration input.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password: String,
    pub phone: String,
}

/// Partial profile update. `None` fields are left unchanged.
///
/// There is no email field: email is immutable once registered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none()
    }

    /// Merge into a stored record.
    pub fn apply_to_stored(&self, user: &mut StoredUser) {
        if let Some(name) = &self.name {
            user.name.clone_from(name);
        }
        if let Some(phone) = &self.phone {
            user.phone.clone_from(phone);
        }
    }

    /// Merge into the session copy.
    pub fn apply_to_current(&self, user: &mut CurrentUser) {
        if let Some(name) = &self.name {
            user.name.clone_from(name);
        }
        if let Some(phone) = &self.phone {
            user.phone.clone_from(phone);
        }
    }
}
