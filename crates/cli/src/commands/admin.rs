//! Account and purchase administration.
//!
//! # Usage
//!
//! ```bash
//! # Make sure the default admin account exists
//! qf-cli admin bootstrap --password 'a-strong-password'
//!
//! # Reports
//! qf-cli admin users
//! qf-cli admin purchases
//! qf-cli admin stats
//!
//! # Mark a purchase as paid
//! qf-cli admin set-status 7b0c...e1 completed
//! ```

use std::io::Write;

use quantofy_core::{PurchaseId, PurchaseStatus};
use quantofy_storefront::AppState;

use super::{CommandError, write_json};

/// Create the default admin account unless an admin already exists.
pub fn bootstrap(state: &AppState, password: &str, out: &mut impl Write) -> Result<(), CommandError> {
    let admin = state
        .auth()
        .ensure_default_admin(password)
        .map_err(quantofy_storefront::AppError::from)?;
    tracing::info!(user_id = %admin.id, "Admin account ready");
    writeln!(out, "Admin account: {} ({})", admin.email, admin.id)?;
    Ok(())
}

/// List customer accounts.
pub fn users(state: &AppState, out: &mut impl Write) -> Result<(), CommandError> {
    let customers = state.admin().customers();
    for user in &customers {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            user.id,
            user.email,
            user.name,
            user.created_at.format("%Y-%m-%d")
        )?;
    }
    writeln!(out, "{} customer(s)", customers.len())?;
    Ok(())
}

/// List customer purchases, newest first.
pub fn purchases(state: &AppState, out: &mut impl Write) -> Result<(), CommandError> {
    let purchases = state.admin().all_purchases();
    for entry in &purchases {
        let purchase = &entry.purchase;
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            purchase.id,
            purchase.created_at.format("%Y-%m-%d %H:%M"),
            entry.user_email,
            purchase.status,
            purchase.total,
            purchase.payment_id.as_deref().unwrap_or("-"),
        )?;
    }
    writeln!(out, "{} purchase(s)", purchases.len())?;
    Ok(())
}

/// Print store-wide figures as JSON.
pub fn stats(state: &AppState, out: &mut impl Write) -> Result<(), CommandError> {
    write_json(out, &state.admin().stats())
}

/// Move a purchase to a new status.
pub fn set_status(
    state: &AppState,
    id: &str,
    status: &str,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let id: PurchaseId = id
        .parse()
        .map_err(|_| CommandError::InvalidArgument(format!("purchase id: {id}")))?;
    let status: PurchaseStatus = status.parse().map_err(CommandError::InvalidArgument)?;

    if state.admin().update_purchase_status(id, status) {
        writeln!(out, "Purchase {id} is now {status}")?;
        Ok(())
    } else {
        Err(CommandError::InvalidArgument(format!("no purchase with id {id}")))
    }
}
