//! CLI error types and conversions

use crate::downloader::{ConfigError, RunError};
use crate::identifier::IdentifierError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Identifier error
    #[error("identifier error: {0}")]
    IdentifierError(#[from] IdentifierError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(#[from] ConfigError),

    /// Run error
    #[error("run error: {0}")]
    RunError(#[from] RunError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
