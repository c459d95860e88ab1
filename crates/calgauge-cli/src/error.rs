//! CLI error types.

use calgauge_core::TracingError;
use calgauge_providers::ProviderError;
use calgauge_server::ServerError;
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end the `calgauge` process.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A secret reference could not be resolved.
    #[error("secret error: {0}")]
    Secret(String),

    /// Provider error.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Engine error.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Logging could not be set up.
    #[error(transparent)]
    Tracing(#[from] TracingError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
