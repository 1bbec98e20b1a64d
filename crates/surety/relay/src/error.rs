//! Error types for the relay

use surety_types::SuretyError;
use thiserror::Error;

/// Relay-level errors
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Rejected protocol operation
    #[error("Protocol error: {0}")]
    Protocol(#[from] SuretyError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for RelayError {
    fn from(err: config::ConfigError) -> Self {
        RelayError::Config(err.to_string())
    }
}

/// Result type alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;
