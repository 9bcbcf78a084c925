use crate::backend::{AuthError, BlobError, UpstreamError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Failures surfaced by client operations. Every variant renders as a
/// message fit for inline display.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("You must be signed in to do that.")]
    Unauthenticated,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Please enter a valid URL.")]
    InvalidUrl(String),
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("Upload failed: {0}")]
    UploadFailed(String),
    #[error("Remote job returned an incomplete result: {0}")]
    MalformedUpstreamResponse(String),
    #[error("{0}")]
    Upstream(#[from] UpstreamError),
    #[error("Processing of `{file_path}` was confirmed but its download URL is unavailable: {message}")]
    DownloadUrlUnavailable { file_path: String, message: String },
    #[error("Could not delete the file: {0}")]
    DeletionFailed(String),
    #[error("Could not load files: {0}")]
    ListFailed(String),
}

/// A lightweight wrapper for HTTP-facing errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(_) => AppError::not_found(err.to_string()),
            BlobError::InvalidPath => AppError::new(StatusCode::BAD_REQUEST, err.to_string()),
            BlobError::Denied => AppError::forbidden(err.to_string()),
            BlobError::AlreadyExists(_) => AppError::new(StatusCode::CONFLICT, err.to_string()),
            BlobError::Sqlx(_) | BlobError::Io(_) => {
                tracing::error!("storage failure: {}", err);
                AppError::internal("internal storage error")
            }
        }
    }
}
