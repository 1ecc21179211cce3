//! User repository over the persisted user list.
//!
//! Every write is a read-modify-write of the whole `quantofy_users`
//! document, which is only safe with a single active writer.

use quantofy_core::{Email, UserId, UserRole};

use super::{RepositoryError, Storage};
use crate::models::session_keys;
use crate::models::user::StoredUser;

/// Repository for user records.
pub struct UserRepository<'a> {
    storage: &'a Storage,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Every stored user, in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<StoredUser> {
        self.storage.load(session_keys::USERS)
    }

    /// Find a user by exact, case-sensitive email.
    #[must_use]
    pub fn get_by_email(&self, email: &Email) -> Option<StoredUser> {
        self.all().into_iter().find(|u| &u.email == email)
    }

    /// Find a user by ID.
    #[must_use]
    pub fn get_by_id(&self, id: UserId) -> Option<StoredUser> {
        self.all().into_iter().find(|u| u.id == id)
    }

    /// Find the first user holding `role`.
    #[must_use]
    pub fn first_with_role(&self, role: UserRole) -> Option<StoredUser> {
        self.all().into_iter().find(|u| u.role == role)
    }

    /// Append a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    pub fn create(&self, user: StoredUser) -> Result<StoredUser, RepositoryError> {
        let mut users = self.all();
        if users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        users.push(user.clone());
        self.storage.save(session_keys::USERS, &users);
        Ok(user)
    }

    /// Apply `change` to the user with `id` and persist the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no user has that ID.
    pub fn update(
        &self,
        id: UserId,
        change: impl FnOnce(&mut StoredUser),
    ) -> Result<StoredUser, RepositoryError> {
        let mut users = self.all();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {id}")))?;
        change(user);
        let updated = user.clone();
        self.storage.save(session_keys::USERS, &users);
        Ok(updated)
    }

    /// Delete the whole user list.
    pub fn clear(&self) {
        self.storage.remove(session_keys::USERS);
    }
}
