//! Error types for dossier-ingest
//!
//! [`PipelineError`] is the taxonomy of a pipeline session. Failures raised
//! before the event stream opens become a synchronous HTTP 500 with
//! `{"error": message}`; failures after it opens are delivered in-band as a
//! terminal `error` event.
//!
//! [`ApiError`] covers the plain read endpoints (`/profile`, `/sources`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Pipeline failure kinds
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or rejected bearer credential
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Missing or malformed request fields, or nothing to work on
    #[error("{0}")]
    Input(String),

    /// Document decoding or network fetch failed
    #[error("Failed to acquire source content: {0}")]
    Acquisition(String),

    /// Extraction service rejected the request or its stream broke
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Extraction output was not a valid profile document
    #[error("Failed to parse extraction output: {0}")]
    Parse(String),

    /// Store read or write failed
    #[error("Failed to save results: {0}")]
    Persistence(String),

    /// Session bookkeeping went wrong (rejected state transition)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Client went away; nothing is reported and nothing is persisted
    #[error("Client disconnected")]
    Cancelled,
}

impl PipelineError {
    /// Short kind name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Auth(_) => "auth",
            PipelineError::Input(_) => "input",
            PipelineError::Acquisition(_) => "acquisition",
            PipelineError::Extraction(_) => "extraction",
            PipelineError::Parse(_) => "parse",
            PipelineError::Persistence(_) => "persistence",
            PipelineError::Internal(_) => "internal",
            PipelineError::Cancelled => "cancelled",
        }
    }
}

impl From<dossier_common::Error> for PipelineError {
    fn from(err: dossier_common::Error) -> Self {
        PipelineError::Persistence(err.to_string())
    }
}

/// Pre-stream failures: plain JSON body, status 500.
impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Read endpoint error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or rejected credential (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// dossier-common error
    #[error("Common error: {0}")]
    Common(#[from] dossier_common::Error),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Auth(msg) => ApiError::Unauthorized(msg),
            other => ApiError::Common(dossier_common::Error::Internal(other.to_string())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
