//! Common error types for the spellbook catalog

use thiserror::Error;

/// Common result type for spellbook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the spellbook crates
///
/// Expected conditions (records without a name, conflicts the decision-maker
/// declined) are reported through result summaries, not through this type.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested catalog or queue entry not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation requires a privileged caller
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Storage backend failure not covered by a more specific variant
    #[error("Internal error: {0}")]
    Internal(String),
}
