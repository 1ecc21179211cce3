//! Form input validation for the login and registration screens.
//!
//! These checks belong to the caller layer: the auth service itself only
//! enforces uniqueness and credential matching.

use std::fmt;

use thiserror::Error;

use quantofy_core::Email;

use super::user::NewUser;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A single invalid field and the message to show next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// One or more form fields failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    /// Message for `field`, if it failed.
    #[must_use]
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.fields.iter().map(|e| e.field).collect();
        write!(f, "invalid fields: {}", names.join(", "))
    }
}

#[derive(Default)]
struct Collector(Vec<FieldError>);

impl Collector {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn email(&mut self, raw: &str) -> Option<Email> {
        if raw.trim().is_empty() {
            self.push("email", "E-mail é obrigatório");
            return None;
        }
        match Email::parse(raw.trim()) {
            Ok(email) => Some(email),
            Err(_) => {
                self.push("email", "E-mail inválido");
                None
            }
        }
    }

    fn finish<T>(self, value: Option<T>) -> Result<T, ValidationError> {
        match value {
            Some(value) if self.0.is_empty() => Ok(value),
            _ => Err(ValidationError { fields: self.0 }),
        }
    }
}

/// Raw login form input.
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    /// Validate and return the parsed email and password.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` listing every invalid field.
    pub fn validate(&self) -> Result<(Email, String), ValidationError> {
        let mut errors = Collector::default();
        let email = errors.email(&self.email);
        if self.password.trim().is_empty() {
            errors.push("password", "Senha é obrigatória");
        }
        errors.finish(email.map(|email| (email, self.password.clone())))
    }
}

/// Raw registration form input.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    /// Validate and build the registration input.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` listing every invalid field.
    pub fn validate(&self) -> Result<NewUser, ValidationError> {
        let mut errors = Collector::default();

        if self.name.trim().is_empty() {
            errors.push("name", "Nome é obrigatório");
        }
        let email = errors.email(&self.email);
        if self.phone.trim().is_empty() {
            errors.push("phone", "Telefone é obrigatório");
        }
        if self.password.trim().is_empty() {
            errors.push("password", "Senha é obrigatória");
        } else if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(
                "password",
                format!("Senha deve ter pelo menos {MIN_PASSWORD_LENGTH} caracteres"),
            );
        }
        if self.password != self.confirm_password {
            errors.push("confirmPassword", "Senhas não coincidem");
        }

        errors.finish(email.map(|email| NewUser {
            name: self.name.trim().to_owned(),
            email,
            password: self.password.clone(),
            phone: self.phone.trim().to_owned(),
        }))
    }
}
