//! State backend error types and their HTTP representation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the state backend.
///
/// The HTTP status is the error taxonomy; bodies are plain text carrying a
/// short reason so terraform can display them.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// State document failed to decode
    #[error("state decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// I/O error while serving
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing lock ID on POST / LOCK / UNLOCK
    #[error("empty lock ID")]
    EmptyLockId,

    /// Incoming state carries a different lineage than the stored one
    #[error("alien state lineage")]
    AlienLineage,

    /// Lock held by someone else (or unlock with a non-matching ID)
    #[error("locked")]
    Locked,

    /// Stored state object exists but carries no state document
    #[error("state is empty")]
    EmptyState,

    /// Unsupported HTTP method
    #[error("404 page not found")]
    UnknownVerb,
}

impl BackendError {
    /// HTTP status code of this error.
    pub fn status(&self) -> StatusCode {
        match self {
            BackendError::EmptyLockId | BackendError::AlienLineage => StatusCode::BAD_REQUEST,
            BackendError::Locked => StatusCode::LOCKED,
            BackendError::UnknownVerb => StatusCode::NOT_FOUND,
            BackendError::Kube(kube::Error::Api(err)) => match err.reason.as_str() {
                "NotFound" => StatusCode::NOT_FOUND,
                "Conflict" | "AlreadyExists" => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            BackendError::Kube(_)
            | BackendError::Decode(_)
            | BackendError::Io(_)
            | BackendError::EmptyState => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain text body of this error.
    pub fn message(&self) -> String {
        match self {
            BackendError::Kube(kube::Error::Api(err)) => {
                format!("{}: {}", err.reason, err.message)
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}
