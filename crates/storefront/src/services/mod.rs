//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Accounts, the session and purchase history
//! - `cart` - The shopping cart
//! - `checkout` - The checkout flow against the payment gateway
//! - `admin` - Operator reports, exports and data reset

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
