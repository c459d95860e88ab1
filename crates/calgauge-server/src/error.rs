//! Server error types.

use std::io;
use std::net::SocketAddr;

use calgauge_providers::ProviderError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The credential store or an external collaborator failed as a whole.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Metric registration or encoding failed.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// The HTTP listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A background task panicked or was cancelled.
    #[error("background task failed: {message}")]
    Task { message: String },
}

impl ServerError {
    /// Creates a bind error.
    pub fn bind(addr: SocketAddr, source: io::Error) -> Self {
        Self::Bind { addr, source }
    }

    /// Creates a task error.
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_render_context() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let bind = ServerError::bind(addr, io::Error::from(io::ErrorKind::AddrInUse));
        assert!(bind.to_string().starts_with("failed to bind 127.0.0.1:8080"));

        let task = ServerError::task("refresh loop: cancelled");
        assert!(matches!(task, ServerError::Task { .. }));
        assert_eq!(task.to_string(), "background task failed: refresh loop: cancelled");
    }
}
