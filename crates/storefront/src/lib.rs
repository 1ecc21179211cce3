//! Quantofy storefront library.
//!
//! Storefront core for the Quantofy digital products store: the product
//! catalog, accounts and sessions, the cart, checkout against the Asaas
//! payment gateway, payment webhooks and operator reporting.
//!
//! [`state::AppState`] wires the services over one [`db::Storage`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod asaas;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

pub use config::StorefrontConfig;
pub use error::{AppError, ErrorKind};
pub use state::AppState;
