//! Bundle file endpoint
//!
//! Serves the files inside a bundle directory, mostly the audio whose URL
//! `GETBUNDLE` hands out. Callers authorize with the same session cookie as
//! the WebSocket; the project id comes from the path.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::io::ErrorKind;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::cookies::SessionCookies;
use crate::AppState;

/// Why a file request was refused
#[derive(Debug, Error)]
pub enum FileError {
    #[error("You are not authenticated.")]
    Unauthorized,

    #[error("Invalid file path.")]
    BadPath,

    #[error("File not found.")]
    NotFound,

    #[error("Could not read file.")]
    Unreadable,
}

impl IntoResponse for FileError {
    fn into_response(self) -> Response {
        let status = match self {
            FileError::Unauthorized => StatusCode::UNAUTHORIZED,
            FileError::BadPath => StatusCode::BAD_REQUEST,
            FileError::NotFound => StatusCode::NOT_FOUND,
            FileError::Unreadable => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// GET /file/project/:project_id/session/:session_name/file/:file_name
///
/// `session_name` is the session directory name without its `_ses`
/// suffix. The bundle is the part of `file_name` before the first dot.
pub async fn get_bundle_file(
    State(state): State<AppState>,
    SessionCookies(credentials): SessionCookies,
    Path((project_id, session_name, file_name)): Path<(String, String, String)>,
) -> Result<Response, FileError> {
    if let Err(e) = state
        .gate
        .authenticate(credentials.token.as_deref(), Some(project_id.as_str()))
        .await
    {
        warn!(
            token = %credentials.redacted_token(),
            "File request for project {} refused: {}", project_id, e
        );
        return Err(FileError::Unauthorized);
    }

    let bundle = file_name.split('.').next().unwrap_or_default();
    let path = state
        .layout
        .bundle_in_slug(&project_id, &session_name, bundle)
        .and_then(|location| location.file_path(&file_name))
        .map_err(|e| {
            warn!("Rejected file request: {}", e);
            FileError::BadPath
        })?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No such file: {}", path.display());
            return Err(FileError::NotFound);
        }
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            return Err(FileError::Unreadable);
        }
    };

    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, content_type.to_string())], bytes).into_response())
}
