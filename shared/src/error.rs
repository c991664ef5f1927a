//! Error types for the event Lambda functions.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling an event invocation.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid client input
    #[error("Validation error: {0}")]
    Validation(String),

    /// No record exists for the given id
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP verb the handler does not serve
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Registering a scheduled callback failed
    #[error("Scheduling error: {0}")]
    Scheduling(String),

    /// Record store backend failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::NotFound(_) => 404,
            Error::MethodNotAllowed(_) => 405,
            _ => 500,
        }
    }

    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}
