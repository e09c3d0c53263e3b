//! Error types for slipstream-netcode

use thiserror::Error;

/// Netcode error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or failed validation
    #[error("Config error: {0}")]
    Config(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] slipstream_core::Error),
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;
