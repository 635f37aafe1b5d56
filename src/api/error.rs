//! HTTP error mapping.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::core::ArtifactError;
use crate::index::IndexError;

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unsupported brief: {0}")]
    MalformedBriefInput(String),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Retrieval(#[from] IndexError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::MalformedBriefInput(_) => (StatusCode::BAD_REQUEST, "MalformedBriefInput"),
            Self::Multipart(_) => (StatusCode::BAD_REQUEST, "MultipartError"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            Self::Retrieval(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RetrievalError"),
            Self::Artifact(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ArtifactError"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(json!({ "error": kind, "message": self.to_string() }))).into_response()
    }
}
