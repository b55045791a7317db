use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Invalid retrieval data: {0}")]
    Protocol(#[from] orca_protocol::ProtocolError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] orca_vector_store::VectorStoreError),

    #[error("Retrieval timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Rate limit exceeded, retry in {:.2}s", .wait.as_secs_f64())]
    RateLimited { wait: Duration },

    /// Raw upstream message, rendered verbatim
    #[error("{0}")]
    Upstream(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl RetrievalError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Our own limiter denials, or an upstream message that says the same.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
            || self.to_string().starts_with("Rate limit exceeded")
    }

    /// Stable name used when counting failures by kind
    pub const fn class_name(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "Protocol",
            Self::VectorStore(_) => "VectorStore",
            Self::Timeout(_) => "Timeout",
            Self::Connection(_) => "Connection",
            Self::RateLimited { .. } => "RateLimited",
            Self::Upstream(_) => "Upstream",
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::ConfigParse(_) => "ConfigParse",
            Self::Io(_) => "Io",
            Self::Other(_) => "Other",
        }
    }
}
