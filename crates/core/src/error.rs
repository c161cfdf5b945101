//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid permission level: {0}")]
    InvalidLevel(String),

    #[error("invalid organization role: {0}")]
    InvalidRole(String),

    #[error("invalid resource kind: {0}")]
    InvalidResourceKind(String),

    #[error("invalid client id: {0}")]
    InvalidClientId(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
