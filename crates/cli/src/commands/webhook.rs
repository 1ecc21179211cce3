//! Replay a saved gateway notification against local purchases.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use quantofy_storefront::{AppError, AppState};

use super::{CommandError, write_json};

/// Apply the notification stored in `file` as if it had just arrived.
///
/// `token` is checked like the `asaas-access-token` header.
pub fn replay(
    state: &AppState,
    file: &Path,
    token: Option<&str>,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let body = fs::read_to_string(file)?;
    let ack = state
        .webhooks()
        .handle_request(token, &body, Utc::now())
        .map_err(AppError::from)?;
    write_json(out, &ack)
}
