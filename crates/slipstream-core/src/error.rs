//! Error types for slipstream-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid snapshot for {entity}: {reason}")]
    InvalidSnapshot { entity: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
