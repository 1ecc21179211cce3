//! Data export and reset.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use quantofy_storefront::AppState;
use quantofy_storefront::services::admin::ExportKind;

use super::CommandError;

/// Write an export to `path`, or to `quantofy_<kind>_<date>.json` in the
/// working directory.
pub fn export(
    state: &AppState,
    kind: ExportKind,
    path: Option<PathBuf>,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let data = state.admin().export(kind)?;
    let path = path.unwrap_or_else(|| PathBuf::from(kind.file_name(Utc::now().date_naive())));

    fs::write(&path, serde_json::to_vec_pretty(&data)?)?;
    tracing::info!(kind = %kind, path = %path.display(), "Export written");
    writeln!(out, "Exported {kind} to {}", path.display())?;
    Ok(())
}

/// Delete every account, the saved product list and all purchases.
pub fn clear(state: &AppState, confirmed: bool, out: &mut impl Write) -> Result<(), CommandError> {
    if !confirmed {
        return Err(CommandError::NotConfirmed("clear all store data"));
    }
    state.admin().clear_data();
    writeln!(out, "Store data cleared")?;
    Ok(())
}
