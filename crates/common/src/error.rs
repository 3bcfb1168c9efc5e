//! Common error types for Huddle components.

use thiserror::Error;

/// Errors shared across Huddle components.
#[derive(Error, Debug)]
pub enum HuddleError {
    /// Signaling channel transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks the required privilege
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using `HuddleError`
pub type Result<T> = std::result::Result<T, HuddleError>;
