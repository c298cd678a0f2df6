//! Error types for the Ghost operator.

use thiserror::Error;

/// Errors that can occur during operator operations.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// A required metadata field is missing on an object.
    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// API error reported by a non-kube backend (e.g. an in-memory cluster).
    #[error("API error: {0}")]
    ApiError(String),
}

/// Result type for operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

impl OperatorError {
    /// HTTP status code of the underlying API response, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            OperatorError::KubeError(kube::Error::Api(resp)) => Some(resp.code),
            _ => None,
        }
    }

    /// True when the API server answered 404.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// True when an optimistic-concurrency check failed (409).
    ///
    /// Conflicts are retried like any other failure.
    pub fn is_conflict(&self) -> bool {
        self.status_code() == Some(409)
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for OperatorError {
    fn from(err: serde_yaml::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}
