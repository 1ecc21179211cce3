//! Command implementations.
//!
//! Every command writes its result to the given writer; logs go to stderr.

pub mod admin;
pub mod catalog;
pub mod data;
pub mod payments;
pub mod webhook;

use std::io::{self, Write};

use serde::Serialize;
use thiserror::Error;

use quantofy_storefront::AppError;
use quantofy_storefront::state::StateError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Storefront operation failed.
    #[error(transparent)]
    App(#[from] AppError),

    /// The data directory or gateway client could not be set up.
    #[error(transparent)]
    State(#[from] StateError),

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Output could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A command-line value was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A destructive command was run without confirmation.
    #[error("Refusing to {0} without --yes")]
    NotConfirmed(&'static str),
}

/// Write `value` as pretty JSON followed by a newline.
pub(crate) fn write_json(out: &mut impl Write, value: &impl Serialize) -> Result<(), CommandError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
