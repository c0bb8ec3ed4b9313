//! Common error types for emuws

use thiserror::Error;

/// Common result type for emuws operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by the emuws crates
#[derive(Error, Debug)]
pub enum Error {
    /// Registry database error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required setting was not supplied by any configuration source
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    /// Malformed protocol input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
