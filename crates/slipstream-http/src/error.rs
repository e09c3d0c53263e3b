//! Error types for the HTTP transport

use thiserror::Error;

/// HTTP transport error
#[derive(Debug, Error)]
pub enum Error {
    /// Endpoint could not be parsed
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Connection, timeout or body decoding failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned status {0}")]
    Status(u16),
}

/// Result type for the HTTP transport
pub type Result<T> = std::result::Result<T, Error>;
