//! Error types for emuws-server
//!
//! The `Display` text of each variant is what an ERROR response carries in
//! `status.message`, so messages name files, never absolute server paths.

use thiserror::Error;

use crate::auth::AuthError;

/// Errors a command handler can fail with
#[derive(Error, Debug)]
pub enum Error {
    /// Authorization gate rejected the request
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Project configuration document missing or malformed
    #[error("Could not read project configuration {file}: {reason}")]
    ConfigUnreadable { file: String, reason: String },

    /// Membership re-check during bundle assembly failed
    #[error("User not authorized to access the project with id {0}")]
    NotAuthorizedForProject(String),

    /// Audio file missing or not a parseable container
    #[error("Could not read audio metadata from {file}: {reason}")]
    AudioMetadataUnreadable { file: String, reason: String },

    /// Annotation document missing or malformed
    #[error("Could not read annotation {file}: {reason}")]
    AnnotationUnreadable { file: String, reason: String },

    /// Known command with undecodable fields
    #[error("{0}")]
    InvalidRequest(String),

    /// Client-supplied name unusable as a path component
    #[error("Invalid {kind}: {value:?}")]
    InvalidName { kind: &'static str, value: String },

    /// Bundle directory does not exist
    #[error("Bundle {bundle} not found in session {session}")]
    BundleNotFound { session: String, bundle: String },

    /// File encoding this server cannot decode
    #[error("Unsupported encoding for {file}: {reason}")]
    UnsupportedEncoding { file: String, reason: String },

    /// Bundle list kept changing underneath the save
    #[error("Bundle list for {owner} was modified concurrently, progress not saved")]
    BundleListConflict { owner: String },

    /// Registry query failed; the cause is logged, not sent
    #[error("Registry unavailable")]
    Registry(#[from] emuws_common::Error),

    /// Response data could not be encoded
    #[error("Encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// Handler panicked
    #[error("Internal error")]
    Internal,

    /// File write or read failure not covered above
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Registry(emuws_common::Error::Database(err))
    }
}

/// Convenience Result type using the emuws-server Error
pub type Result<T> = std::result::Result<T, Error>;
