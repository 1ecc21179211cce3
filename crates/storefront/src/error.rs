//! Unified error handling with Sentry integration.
//!
//! [`AppError`] wraps every component error so callers at the edge (the CLI,
//! an embedding UI) can report it once and show [`AppError::user_message`].
//! Server-side failures are captured to Sentry by [`AppError::report`].

use thiserror::Error;

use crate::asaas::{GatewayError, WebhookError};
use crate::config::ConfigError;
use crate::db::{RepositoryError, StorageError};
use crate::models::ValidationError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Storage backend failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Repository constraint violated.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Payment gateway operation failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Checkout flow failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Webhook delivery rejected.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Form input rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; the user can fix it.
    Validation,
    /// Credentials or session problem.
    Auth,
    /// The payment gateway failed or rejected the request.
    Gateway,
    /// Stored data could not be read or written.
    CorruptPersistedState,
    /// Anything else.
    Internal,
}

impl AppError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Config(_) => ErrorKind::Validation,
            Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash) => ErrorKind::Internal,
            Self::Auth(_) | Self::Webhook(WebhookError::Unauthorized) => ErrorKind::Auth,
            Self::Webhook(WebhookError::Parse(_)) => ErrorKind::Validation,
            Self::Checkout(CheckoutError::Gateway(_)) | Self::Gateway(_) => ErrorKind::Gateway,
            Self::Checkout(_) => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::CorruptPersistedState,
            Self::Repository(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to show to the person using the storefront.
    ///
    /// Internal details never leak.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(err) => err.user_message().to_owned(),
            Self::Checkout(err) => err.user_message().to_owned(),
            Self::Gateway(_) => crate::services::checkout::PAYMENT_FAILED_MESSAGE.to_owned(),
            Self::Validation(err) => err.to_string(),
            Self::Webhook(WebhookError::Unauthorized) => "Acesso negado".to_owned(),
            Self::Webhook(WebhookError::Parse(_)) => "Notificação inválida".to_owned(),
            Self::Config(err) => err.to_string(),
            Self::Storage(_) | Self::Repository(_) | Self::Internal(_) => {
                "Erro interno. Tente novamente.".to_owned()
            }
        }
    }

    /// Log the error and capture it to Sentry if it is a server-side failure.
    pub fn report(&self) {
        if matches!(
            self.kind(),
            ErrorKind::Gateway | ErrorKind::CorruptPersistedState | ErrorKind::Internal
        ) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Operation failed"
            );
        } else {
            tracing::warn!(error = %self, "Operation rejected");
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a shopper action.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "2")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_owned()),
        message: Some(message.to_owned()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_owned(),
                serde_json::Value::String((*value).to_owned()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Internal("disk full".to_owned());
        assert_eq!(err.to_string(), "Internal error: disk full");

        let err = AppError::from(AuthError::DuplicateEmail);
        assert_eq!(err.to_string(), "Auth error: email already registered");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            AppError::from(AuthError::InvalidCredentials).kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            AppError::from(AuthError::PasswordHash).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            AppError::from(CheckoutError::EmptyCart).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AppError::from(CheckoutError::Gateway(GatewayError::Parse("x".to_owned()))).kind(),
            ErrorKind::Gateway
        );
        assert_eq!(
            AppError::from(WebhookError::Unauthorized).kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            AppError::Internal("x".to_owned()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = AppError::from(RepositoryError::Conflict("quantofy_users".to_owned()));
        assert_eq!(err.user_message(), "Erro interno. Tente novamente.");
        assert!(!err.user_message().contains("quantofy_users"));

        let err = AppError::from(GatewayError::Api {
            status: 400,
            message: "invalid cpfCnpj".to_owned(),
        });
        assert!(!err.user_message().contains("cpfCnpj"));

        let err = AppError::from(AuthError::InvalidCredentials);
        assert_eq!(err.user_message(), "E-mail ou senha incorretos");
    }
}
