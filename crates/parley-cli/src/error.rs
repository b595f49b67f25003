//! CLI-specific error types and exit codes.

use parley_voice::{ConfigError, VoiceError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Nothing could be spoken, or a required service is down.
    #[error("{0}")]
    Unavailable(String),

    /// Speech backend error.
    #[error(transparent)]
    Voice(#[from] VoiceError),
}

impl CliError {
    /// Map error to an exit code (sysexits.h where one fits).
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Arguments(_) => 2,   // EX_USAGE
            CliError::Config(_) => 78,     // EX_CONFIG
            CliError::Unavailable(_) => 69, // EX_UNAVAILABLE
            CliError::Voice(_) => 1,
        }
    }
}

/// Exit code for any error returned by a handler.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<CliError>().map_or(1, CliError::exit_code)
}
