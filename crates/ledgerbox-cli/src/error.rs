//! CLI error types.

use ledgerbox_core::{Error as CoreError, StoreError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Error, Debug)]
pub enum CliError {
    /// Protocol operation failed (bad key, failed authentication, etc.).
    ///
    /// Usually a problem with the arguments; the message names the cause.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Local key database could not be opened or written.
    #[error("key store error: {0}")]
    Store(#[from] StoreError),

    /// Writing command output failed.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}
