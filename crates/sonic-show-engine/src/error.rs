//! Error types for the show engine.
//!
//! Every failure carries enough information for the transport layer to pick
//! a status code through [`ShowError::class`]; the engine itself never maps
//! errors to wire statuses.

use thiserror::Error;

/// Coarse failure classes consumed by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// No data present for the requested scope.
    NotFound,
    /// Malformed option, unknown interface in a strict context, bad period.
    InvalidArgument,
    /// Everything else.
    Internal,
}

/// Show engine errors
#[derive(Error, Debug)]
pub enum ShowError {
    /// Query tuple or option failed validation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Alias-mode lookup of a name that is not a known alias
    #[error("Cannot find interface name for alias {0}")]
    UnknownAlias(String),

    /// Explicitly requested namespace is not part of the discovered topology
    #[error("Unknown namespace '{0}'")]
    UnknownNamespace(String),

    /// Requested scope holds no data
    #[error("No data: {0}")]
    NotFound(String),

    /// Store read failed
    #[error("Database operation failed: {target}: {message}")]
    Database {
        /// Store target (e.g. "COUNTERS_DB" or "CONFIG_DB/asic0").
        target: String,
        /// Error message.
        message: String,
    },

    /// Configuration file could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Windowed request was cancelled while waiting
    #[error("Request cancelled while waiting for the sampling window")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error (unexpected state)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShowError {
    /// Creates an invalid argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a database error.
    pub fn database(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the failure class used for status mapping.
    pub fn class(&self) -> ErrorClass {
        match self {
            ShowError::NotFound(_) => ErrorClass::NotFound,
            ShowError::InvalidArgument(_)
            | ShowError::UnknownAlias(_)
            | ShowError::UnknownNamespace(_) => ErrorClass::InvalidArgument,
            _ => ErrorClass::Internal,
        }
    }
}

/// Result type for show engine operations
pub type Result<T> = std::result::Result<T, ShowError>;
