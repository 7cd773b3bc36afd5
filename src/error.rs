/// Unified error types for the LID mapping store
use thiserror::Error;

/// Main error type for mapping operations
///
/// Only collaborator failures surface here. Lookup misses, rejected pairs and
/// undecodable identifiers are reported as `None` / skipped writes instead.
#[derive(Error, Debug)]
pub enum MappingError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Key-value store errors not originating from the database driver
    #[error("Key store error: {0}")]
    Store(String),

    /// Directory resolver errors
    #[error("Directory resolution error: {0}")]
    Resolver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for mapping operations
pub type MappingResult<T> = Result<T, MappingError>;
