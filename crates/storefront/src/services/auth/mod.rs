//! Authentication service.
//!
//! Password accounts stored in the local user list, with an explicit
//! [`Session`] carrying who is logged in. Login, registration and password
//! reset wait for the configured latency before answering, profile updates
//! for half of it.

mod error;
mod session;

pub use error::AuthError;
pub use session::{AuthState, Session};

use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use tracing::{info, instrument};

use quantofy_core::{Email, UserId, UserRole};

use crate::db::purchases::PurchaseRepository;
use crate::db::users::UserRepository;
use crate::db::{RepositoryError, Storage};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::purchase::{NewPurchase, Purchase};
use crate::models::user::{CurrentUser, NewUser, ProfileUpdate, StoredUser};

/// Email of the bootstrap administrator.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@quantofy.com";

/// Display name of the bootstrap administrator.
pub const DEFAULT_ADMIN_NAME: &str = "Administrador Quantofy";

/// Phone of the bootstrap administrator.
pub const DEFAULT_ADMIN_PHONE: &str = "11999999999";

/// Confirmation returned by [`AuthService::reset_password`].
pub const RESET_PASSWORD_MESSAGE: &str = "E-mail de recuperação enviado";

/// Authentication service.
///
/// Handles registration, login, profile changes, and the purchase history
/// of the logged-in user.
#[derive(Debug, Clone)]
pub struct AuthService {
    storage: Storage,
    latency: Duration,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(storage: Storage, latency: Duration) -> Self {
        Self { storage, latency }
    }

    /// Restore the persisted session.
    #[must_use]
    pub fn restore_session(&self) -> Session {
        Session::restore(&self.storage)
    }

    const fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.storage)
    }

    const fn purchases(&self) -> PurchaseRepository<'_> {
        PurchaseRepository::new(&self.storage)
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new customer and log them in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DuplicateEmail` if the email is already registered.
    /// Returns `AuthError::PasswordHash` if the password cannot be hashed.
    #[instrument(skip(self, session, new_user), fields(email = %new_user.email))]
    pub async fn register(
        &self,
        session: &mut Session,
        new_user: NewUser,
    ) -> Result<CurrentUser, AuthError> {
        let mut session = session.begin();
        tokio::time::sleep(self.latency).await;

        if self.users().get_by_email(&new_user.email).is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = hash_password(&new_user.password)?;
        let user = self
            .users()
            .create(StoredUser {
                id: UserId::generate(),
                name: new_user.name,
                email: new_user.email,
                password_hash,
                phone: new_user.phone,
                role: UserRole::Customer,
                created_at: Utc::now(),
                last_login: None,
            })
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::DuplicateEmail,
                other => AuthError::Repository(other),
            })?;

        let current = CurrentUser::from(&user);
        session.set_user(&self.storage, Some(current.clone()));
        set_sentry_user(&current.id, Some(current.email.as_str()));
        info!(user_id = %current.id, "User registered");

        Ok(current)
    }

    /// Log in with email and password.
    ///
    /// On failure the session keeps whoever was logged in before.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if no account matches the
    /// email exactly or the password does not verify.
    #[instrument(skip(self, session, email, password), fields(email = %email))]
    pub async fn login(
        &self,
        session: &mut Session,
        email: &Email,
        password: &str,
    ) -> Result<CurrentUser, AuthError> {
        let mut session = session.begin();
        tokio::time::sleep(self.latency).await;

        let user = self
            .users()
            .get_by_email(email)
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &user.password_hash)?;

        let now = Utc::now();
        let user = self.users().update(user.id, |u| u.last_login = Some(now))?;

        let current = CurrentUser::from(&user);
        session.set_user(&self.storage, Some(current.clone()));
        set_sentry_user(&current.id, Some(current.email.as_str()));
        info!(user_id = %current.id, "User logged in");

        Ok(current)
    }

    /// Log out. Does nothing for an anonymous session.
    pub fn logout(&self, session: &mut Session) {
        if let Some(user_id) = session.user_id() {
            info!(user_id = %user_id, "User logged out");
        }
        session.set_user(&self.storage, None);
        clear_sentry_user();
    }

    /// Request a password reset for `email`.
    ///
    /// No email is actually sent; the request is only logged.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownEmail` if no account uses that email.
    #[instrument(skip(self, session, email), fields(email = %email))]
    pub async fn reset_password(
        &self,
        session: &mut Session,
        email: &Email,
    ) -> Result<&'static str, AuthError> {
        let _loading = session.begin();
        tokio::time::sleep(self.latency).await;

        if self.users().get_by_email(email).is_none() {
            return Err(AuthError::UnknownEmail);
        }

        info!("Password reset requested");
        Ok(RESET_PASSWORD_MESSAGE)
    }

    /// Change name and/or phone of the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` without a logged-in user.
    pub async fn update_profile(
        &self,
        session: &mut Session,
        update: &ProfileUpdate,
    ) -> Result<CurrentUser, AuthError> {
        let user_id = session.user_id().ok_or(AuthError::NotAuthenticated)?;
        let mut session = session.begin();
        tokio::time::sleep(self.latency / 2).await;

        if update.is_empty() {
            return session
                .current_user()
                .cloned()
                .ok_or(AuthError::NotAuthenticated);
        }

        // A session can outlive its stored record; the session copy is still updated
        match self.users().update(user_id, |u| update.apply_to_stored(u)) {
            Ok(_) | Err(RepositoryError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let Some(current) = session.user_mut() else {
            return Err(AuthError::NotAuthenticated);
        };
        update.apply_to_current(current);
        let current = current.clone();
        session.set_user(&self.storage, Some(current.clone()));
        info!(user_id = %user_id, "Profile updated");

        Ok(current)
    }

    // =========================================================================
    // Purchase History
    // =========================================================================

    /// Record a purchase for the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` without a logged-in user.
    pub fn add_purchase(
        &self,
        session: &Session,
        purchase: NewPurchase,
    ) -> Result<Purchase, AuthError> {
        let user_id = session.user_id().ok_or(AuthError::NotAuthenticated)?;
        let purchase = purchase.into_purchase(user_id, Utc::now());
        self.purchases().append(&purchase);
        info!(
            user_id = %user_id,
            purchase_id = %purchase.id,
            total = %purchase.total.amount(),
            "Purchase recorded"
        );
        Ok(purchase)
    }

    /// Purchases of the logged-in user; empty when anonymous.
    #[must_use]
    pub fn user_purchases(&self, session: &Session) -> Vec<Purchase> {
        session
            .user_id()
            .map(|id| self.purchases().for_user(id))
            .unwrap_or_default()
    }

    // =========================================================================
    // Bootstrap
    // =========================================================================

    /// Create the administrator account unless an admin already exists.
    ///
    /// Returns the existing or newly created admin.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DuplicateEmail` if a customer already uses the
    /// default admin email.
    /// Returns `AuthError::PasswordHash` if the password cannot be hashed.
    pub fn ensure_default_admin(&self, password: &str) -> Result<StoredUser, AuthError> {
        if let Some(admin) = self.users().first_with_role(UserRole::Admin) {
            return Ok(admin);
        }

        let email = Email::parse(DEFAULT_ADMIN_EMAIL)?;
        let admin = self
            .users()
            .create(StoredUser {
                id: UserId::generate(),
                name: DEFAULT_ADMIN_NAME.to_owned(),
                email,
                password_hash: hash_password(password)?,
                phone: DEFAULT_ADMIN_PHONE.to_owned(),
                role: UserRole::Admin,
                created_at: Utc::now(),
                last_login: None,
            })
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::DuplicateEmail,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %admin.id, "Default admin created");
        Ok(admin)
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use quantofy_core::{Price, PurchaseStatus};

    use super::*;
    use crate::models::session_keys;

    fn service() -> AuthService {
        AuthService::new(Storage::in_memory(), Duration::from_millis(1000))
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ana Souza".to_owned(),
            email: Email::parse(email).unwrap(),
            password: "segredo1".to_owned(),
            phone: "11988887777".to_owned(),
        }
    }

    fn purchase() -> NewPurchase {
        NewPurchase {
            items: Vec::new(),
            total: Price::from_cents(14990),
            status: PurchaseStatus::Pending,
            payment_id: Some("pay_1".to_owned()),
            billing_type: None,
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("segredo1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("segredo1", &hash).is_ok());
        assert!(matches!(
            verify_password("segredo2", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_logs_in_as_customer() {
        let auth = service();
        let mut session = Session::anonymous();

        let started = tokio::time::Instant::now();
        let user = auth
            .register(&mut session, new_user("ana@quantofy.com"))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert_eq!(user.role, UserRole::Customer);
        assert_eq!(session.state(), AuthState::Authenticated);
        assert_eq!(session.current_user(), Some(&user));

        let stored = auth.users().get_by_email(&user.email).unwrap();
        assert_ne!(stored.password_hash, "segredo1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_duplicate_email() {
        let auth = service();
        let mut session = Session::anonymous();
        auth.register(&mut session, new_user("ana@quantofy.com"))
            .await
            .unwrap();

        let mut other = Session::anonymous();
        let err = auth
            .register(&mut other, new_user("ana@quantofy.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::DuplicateEmail));
        assert_eq!(auth.users().all().len(), 1);
        assert_eq!(other.state(), AuthState::Anonymous);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_stamps_last_login() {
        let auth = service();
        let mut session = Session::anonymous();
        let registered = auth
            .register(&mut session, new_user("ana@quantofy.com"))
            .await
            .unwrap();
        auth.logout(&mut session);

        let user = auth
            .login(&mut session, &registered.email, "segredo1")
            .await
            .unwrap();

        assert_eq!(user.id, registered.id);
        assert!(user.last_login.is_some());
        assert_eq!(
            auth.users().get_by_id(user.id).unwrap().last_login,
            user.last_login
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_rejects_wrong_password_and_case_variant() {
        let auth = service();
        let mut session = Session::anonymous();
        auth.register(&mut session, new_user("ana@quantofy.com"))
            .await
            .unwrap();
        auth.logout(&mut session);

        let wrong = auth
            .login(&mut session, &Email::parse("ana@quantofy.com").unwrap(), "segredo9")
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let upper = auth
            .login(&mut session, &Email::parse("ANA@quantofy.com").unwrap(), "segredo1")
            .await;
        assert!(matches!(upper, Err(AuthError::InvalidCredentials)));
        assert_eq!(session.state(), AuthState::Anonymous);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_is_idempotent() {
        let auth = service();
        let mut session = Session::anonymous();
        auth.register(&mut session, new_user("ana@quantofy.com"))
            .await
            .unwrap();

        auth.logout(&mut session);
        auth.logout(&mut session);

        assert!(!session.is_authenticated());
        assert!(!auth.restore_session().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_password() {
        let auth = service();
        let mut session = Session::anonymous();
        auth.register(&mut session, new_user("ana@quantofy.com"))
            .await
            .unwrap();

        let message = auth
            .reset_password(&mut session, &Email::parse("ana@quantofy.com").unwrap())
            .await
            .unwrap();
        assert_eq!(message, RESET_PASSWORD_MESSAGE);

        let err = auth
            .reset_password(&mut session, &Email::parse("bia@quantofy.com").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownEmail));
        assert!(session.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_profile_merges_into_store_and_session() {
        let auth = service();
        let mut session = Session::anonymous();
        let user = auth
            .register(&mut session, new_user("ana@quantofy.com"))
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        let updated = auth
            .update_profile(
                &mut session,
                &ProfileUpdate {
                    name: Some("Ana Lima".to_owned()),
                    phone: None,
                },
            )
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(updated.name, "Ana Lima");
        assert_eq!(updated.phone, user.phone);
        assert_eq!(updated.email, user.email);
        assert_eq!(auth.users().get_by_id(user.id).unwrap().name, "Ana Lima");
        assert_eq!(auth.restore_session().current_user().unwrap().name, "Ana Lima");
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_profile_requires_session() {
        let auth = service();
        let mut session = Session::anonymous();
        let err = auth
            .update_profile(&mut session, &ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchases_follow_the_user() {
        let auth = service();
        let mut session = Session::anonymous();
        assert!(matches!(
            auth.add_purchase(&session, purchase()),
            Err(AuthError::NotAuthenticated)
        ));
        assert!(auth.user_purchases(&session).is_empty());

        let user = auth
            .register(&mut session, new_user("ana@quantofy.com"))
            .await
            .unwrap();
        let recorded = auth.add_purchase(&session, purchase()).unwrap();

        assert_eq!(recorded.user_id, user.id);
        assert_eq!(auth.user_purchases(&session), vec![recorded.clone()]);
        assert!(
            auth.storage
                .load_optional::<Vec<Purchase>>(&session_keys::purchases(user.id))
                .is_some()
        );

        auth.logout(&mut session);
        assert!(auth.user_purchases(&session).is_empty());

        auth.login(&mut session, &user.email, "segredo1").await.unwrap();
        assert_eq!(auth.user_purchases(&session), vec![recorded]);
    }

    #[test]
    fn test_ensure_default_admin_runs_once() {
        let auth = service();

        let admin = auth.ensure_default_admin("admin123").unwrap();
        let again = auth.ensure_default_admin("other-password").unwrap();

        assert_eq!(admin.role, UserRole::Admin);
        assert_eq!(admin.email.as_str(), DEFAULT_ADMIN_EMAIL);
        assert_eq!(admin.name, DEFAULT_ADMIN_NAME);
        assert_eq!(again.id, admin.id);
        assert_eq!(auth.users().all().len(), 1);
        assert!(verify_password("admin123", &again.password_hash).is_ok());
    }
}
