use thiserror::Error;

/// Result type for metadata extraction
pub type Result<T> = std::result::Result<T, MetadataError>;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Empty source provided")]
    EmptySource,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
