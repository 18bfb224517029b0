// src/error.rs

use thiserror::Error;

/// Core error types for rpmsolve
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON package descriptions or scenario files
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// A dependency was built with a sense but no version, or the reverse
    #[error("Invalid dependency: {0}")]
    InvalidDependency(String),

    /// Malformed input that is not a dependency (EVR strings, flags, etc.)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// A named package or repository does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),
}

/// Result type alias using rpmsolve's Error type
pub type Result<T> = std::result::Result<T, Error>;
