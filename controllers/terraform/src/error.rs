//! Controller-specific error types.

use thiserror::Error;

/// Errors that can occur in the TFOps controllers.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Object serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object is missing a mandatory metadata field
    #[error("missing object key: {0}")]
    MissingObjectKey(&'static str),

    /// Finalizer handling failed
    #[error("finalizer error: {0}")]
    Finalizer(String),
}
