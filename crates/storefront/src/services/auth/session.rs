//! Explicit session context.
//!
//! A [`Session`] is owned by the caller and passed by `&mut` into every
//! [`AuthService`](super::AuthService) call that reads or changes who is
//! logged in.

use std::ops::{Deref, DerefMut};

use quantofy_core::{UserId, UserRole};

use crate::db::Storage;
use crate::models::session_keys;
use crate::models::user::CurrentUser;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    /// An auth operation is in flight.
    Authenticating,
    Authenticated,
}

/// The current user, if any, and the auth lifecycle state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: AuthState,
    user: Option<CurrentUser>,
}

impl Session {
    /// A session with nobody logged in.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Restore the session persisted under `quantofy_user`.
    ///
    /// A missing or corrupt entry yields an anonymous session.
    #[must_use]
    pub fn restore(storage: &Storage) -> Self {
        storage
            .load_optional::<CurrentUser>(session_keys::CURRENT_USER)
            .map_or_else(Self::anonymous, |user| Self {
                state: AuthState::Authenticated,
                user: Some(user),
            })
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// The logged-in user.
    #[must_use]
    pub const fn current_user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    /// ID of the logged-in user.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id)
    }

    /// Whether someone is logged in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Whether an auth operation is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state == AuthState::Authenticating
    }

    /// Whether the logged-in user holds `role`. Anonymous sessions hold none.
    #[must_use]
    pub fn has_role(&self, role: UserRole) -> bool {
        self.user.as_ref().is_some_and(|u| u.role == role)
    }

    /// Mark an operation in flight until the returned guard drops.
    pub(crate) fn begin(&mut self) -> Loading<'_> {
        self.state = AuthState::Authenticating;
        Loading(self)
    }

    /// Replace the user and persist it (or its absence).
    pub(crate) fn set_user(&mut self, storage: &Storage, user: Option<CurrentUser>) {
        match &user {
            Some(user) => storage.save(session_keys::CURRENT_USER, user),
            None => storage.remove(session_keys::CURRENT_USER),
        }
        self.user = user;
        self.settle();
    }

    pub(crate) fn user_mut(&mut self) -> Option<&mut CurrentUser> {
        self.user.as_mut()
    }

    fn settle(&mut self) {
        self.state = if self.user.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        };
    }
}

/// Holds a session in [`AuthState::Authenticating`].
///
/// Dropping it settles the state from whether a user is set, so an abandoned
/// operation never leaves the session loading.
pub(crate) struct Loading<'s>(&'s mut Session);

impl Deref for Loading<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.0
    }
}

impl DerefMut for Loading<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        self.0
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.settle();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use quantofy_core::Email;

    use super::*;

    fn user(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::generate(),
            name: "Ana".to_owned(),
            email: Email::parse("ana@quantofy.com").unwrap(),
            phone: "11988887777".to_owned(),
            role,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_anonymous_session() {
        let session = Session::anonymous();
        assert_eq!(session.state(), AuthState::Anonymous);
        assert!(!session.is_authenticated());
        assert!(!session.has_role(UserRole::Customer));
        assert!(session.current_user().is_none());
    }

    #[test]
    fn test_set_user_persists_and_restores() {
        let storage = Storage::in_memory();
        let mut session = Session::anonymous();
        let user = user(UserRole::Admin);

        session.set_user(&storage, Some(user.clone()));
        assert_eq!(session.state(), AuthState::Authenticated);
        assert!(session.has_role(UserRole::Admin));

        let restored = Session::restore(&storage);
        assert_eq!(restored.current_user(), Some(&user));

        session.set_user(&storage, None);
        assert!(!Session::restore(&storage).is_authenticated());
    }

    #[test]
    fn test_corrupt_session_restores_anonymous() {
        let storage = Storage::in_memory();
        storage.save_raw(session_keys::CURRENT_USER, "{oops").unwrap();

        let session = Session::restore(&storage);

        assert!(!session.is_authenticated());
        assert!(storage.load_optional::<CurrentUser>(session_keys::CURRENT_USER).is_none());
    }

    #[test]
    fn test_loading_guard_settles_on_drop() {
        let mut session = Session::anonymous();
        {
            let loading = session.begin();
            assert!(loading.is_loading());
        }
        assert_eq!(session.state(), AuthState::Anonymous);
    }
}
