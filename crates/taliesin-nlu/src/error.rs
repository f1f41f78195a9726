//! Error types for the NLU/NLG clients.

use thiserror::Error;

/// Errors from the analyzer or generator service.
#[derive(Debug, Error)]
pub enum NluError {
    /// Transport-level failure: host unreachable, timeout, bad TLS.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("service error {status}: {message}")]
    Backend { status: u16, message: String },

    /// The service answered but the body was not usable.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client was configured with something unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// A bug on our side of the wire.
    #[error("internal error: {0}")]
    Internal(String),
}

impl NluError {
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Failures of the service itself rather than of the utterance. The
    /// dialogue loop maps these onto the "cannot reach the service" apology.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Backend { status, .. } => *status == 404 || *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Transient subset of transport failures worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Backend { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(NluError::backend(404, "not found").is_transport());
        assert!(NluError::backend(503, "unavailable").is_transport());
        assert!(!NluError::backend(400, "bad request").is_transport());
        assert!(!NluError::config("no url").is_transport());
        assert!(!NluError::internal("oops").is_transport());
    }

    #[test]
    fn test_retryable_excludes_not_found() {
        assert!(NluError::backend(429, "slow down").is_retryable());
        assert!(NluError::backend(500, "boom").is_retryable());
        assert!(!NluError::backend(404, "not found").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = NluError::backend(500, "boom");
        assert_eq!(err.to_string(), "service error 500: boom");
    }
}
