use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Query text is empty")]
    EmptyQuery,

    #[error("max_results must be > 0")]
    ZeroMaxResults,

    #[error("Similarity {0} is outside [0, 1]")]
    SimilarityOutOfRange(f32),

    #[error("Date range start ({start}) must be before end ({end})")]
    InvalidDateRange { start: u64, end: u64 },

    #[error("Chunk/score length mismatch: {chunks} chunks, {scores} scores")]
    LengthMismatch { chunks: usize, scores: usize },

    #[error("Chunk {index} has empty content")]
    EmptyChunk { index: usize },

    #[error("Invalid file pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
