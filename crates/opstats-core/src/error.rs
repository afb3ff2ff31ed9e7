//! Error types for opstats

use thiserror::Error;

/// Result type alias using opstats' Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for opstats operations
#[derive(Error, Debug)]
pub enum Error {
    /// An entity reference could not be resolved to a canonical id
    #[error("{entity} not found: {reference}")]
    NotFound {
        /// Kind of entity (organization, project, target)
        entity: String,
        /// The human-facing reference that failed to resolve
        reference: String,
    },

    /// Malformed or inverted time range
    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    /// Malformed pagination cursor
    #[error("Invalid pagination cursor: {0}")]
    InvalidCursor(String),

    /// Count data exists without matching duration data
    #[error("Missing duration data for operation {operation_hash}")]
    MissingDurationData {
        /// The operation hash that lacked a duration entry
        operation_hash: String,
    },

    /// A collaborator (metrics store, id translation) failed or timed out
    #[error("Upstream query failed: {0}")]
    Upstream(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            reference: reference.into(),
        }
    }

    /// Create an invalid range error
    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRange(msg.into())
    }

    /// Create an invalid cursor error
    pub fn invalid_cursor(cursor: impl Into<String>) -> Self {
        Self::InvalidCursor(cursor.into())
    }

    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a failed query is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Database(_))
    }
}
