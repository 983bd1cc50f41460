//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** Internal errors (Database, Io) are logged with full
//! detail but only a generic message is returned to the caller so that
//! file paths, SQL, or other implementation details never leak to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::storage::StorageError;

/// All errors that can occur in the modshelf-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A required field is missing or malformed.  The message names the
    /// violated constraint.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An uploaded file's extension is not in the allow-list for its
    /// asset class.
    #[error("invalid asset type: {0}")]
    InvalidAssetType(String),

    /// An uploaded file exceeds the configured maximum size.
    #[error("file exceeds maximum size of {limit_bytes} bytes")]
    SizeExceeded { limit_bytes: u64 },

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Propagated from the SQLite (or other) store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Disk error reading or writing a blob.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::InvalidAssetType(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::SizeExceeded { limit_bytes } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("file exceeds maximum size of {limit_bytes} bytes"),
            ),
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),

            // Internal errors: log the full detail, return a generic message.
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ServerError::Io(e) => {
                error!(error = %e, "blob io error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<StorageError> for ServerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidAssetType { .. } => ServerError::InvalidAssetType(e.to_string()),
            StorageError::SizeExceeded { limit_bytes } => ServerError::SizeExceeded { limit_bytes },
            StorageError::NotFound(path) => ServerError::NotFound(format!("blob {path} not found")),
            StorageError::Traversal(path) => {
                ServerError::NotFound(format!("blob {path} not found"))
            }
            StorageError::Io(e) => ServerError::Io(e),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        // Log the full error chain before discarding it so that diagnostic
        // detail is preserved in the server logs even though clients only
        // see a generic message.
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}
