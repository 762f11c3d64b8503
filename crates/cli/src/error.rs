//! Error types for operator command handling.

use thiserror::Error;

/// Errors raised while reading one operator command
///
/// Never fatal: the coordinator logs the line and reads the next one.
#[derive(Error, Debug)]
pub enum CliError {
    /// Line is not JSON or not a known command
    #[error("invalid operator command: {0}")]
    InvalidCommand(#[from] serde_json::Error),
}

/// Result type alias for command handling
pub type Result<T> = std::result::Result<T, CliError>;
