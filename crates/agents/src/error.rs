use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Failure reported by a [`crate::LanguageModel`] backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Model request failed: {0}")]
    Request(String),

    #[error("Model rate limit exceeded")]
    RateLimited,

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Model rejected the request: {0}")]
    Rejected(String),
}

impl ModelError {
    /// Transient failures worth another attempt
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Request(_) | Self::RateLimited | Self::Unavailable(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Metadata error: {0}")]
    Metadata(#[from] orca_metadata::MetadataError),

    #[error("Agent timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_retry() {
        assert!(ModelError::RateLimited.is_retryable());
        assert!(ModelError::Unavailable("503".into()).is_retryable());
        assert!(!ModelError::Rejected("bad key".into()).is_retryable());
    }

    #[test]
    fn timeout_renders_seconds() {
        let err = AgentError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Agent timed out after 30s");
    }
}
