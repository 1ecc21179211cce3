//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] quantofy_core::EmailError),

    /// An account with this email already exists.
    #[error("email already registered")]
    DuplicateEmail,

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No account uses this email.
    #[error("unknown email")]
    UnknownEmail,

    /// The operation needs a logged-in user.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Repository error.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Message shown to the person using the storefront.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidEmail(_) => "E-mail inválido",
            Self::DuplicateEmail => "E-mail já cadastrado",
            Self::InvalidCredentials => "E-mail ou senha incorretos",
            Self::UnknownEmail => "E-mail não encontrado",
            Self::NotAuthenticated => "Faça login para continuar",
            Self::Repository(_) | Self::PasswordHash => "Erro interno. Tente novamente.",
        }
    }
}
