//! Quantofy Core - Shared domain types.
//!
//! This crate provides the types used across the Quantofy components:
//! - `storefront` - Catalog, cart, authentication, checkout and payments
//! - `cli` - Operator tooling for bootstrap, reports and data export
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no persistence, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
