//! Domain models for the storefront.
//!
//! Persisted shapes use camelCase field names so existing stored documents
//! keep loading.

pub mod forms;
pub mod product;
pub mod purchase;
pub mod session;
pub mod user;

pub use forms::{FieldError, LoginForm, RegistrationForm, ValidationError};
pub use product::{CartItem, Product};
pub use purchase::{NewPurchase, Purchase};
pub use session::keys as session_keys;
pub use user::{CurrentUser, NewUser, ProfileUpdate, StoredUser};
