use crate::config::ChunkingStrategy;
use crate::error::{ChunkerError, Result};
use crate::language::Language;
use crate::strategy::StrategyExecutor;
use orca_protocol::Chunk;
use std::path::Path;

/// Main chunker interface for processing code
pub struct Chunker {
    strategy: ChunkingStrategy,
}

impl Chunker {
    /// Create a new chunker, rejecting inconsistent strategies
    pub fn new(strategy: ChunkingStrategy) -> Result<Self> {
        strategy.validate().map_err(ChunkerError::invalid_config)?;
        Ok(Self { strategy })
    }

    pub const fn strategy(&self) -> &ChunkingStrategy {
        &self.strategy
    }

    /// Chunk code from a string
    pub fn chunk_str(&self, content: &str, file_path: Option<&str>) -> Result<Vec<Chunk>> {
        let file_path = file_path.unwrap_or("unknown");
        let language = Language::from_path(file_path);
        self.chunk_with_language(content, file_path, language)
    }

    /// Chunk code from a file
    pub fn chunk_file(&self, path: impl AsRef<Path>) -> Result<Vec<Chunk>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file_path = path.to_string_lossy();
        self.chunk_with_language(&content, &file_path, Language::from_path(path))
    }

    /// Chunk code with explicit language
    pub fn chunk_with_language(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<Vec<Chunk>> {
        if content.trim().is_empty() {
            return Err(ChunkerError::EmptyContent);
        }
        let executor = StrategyExecutor::new(self.strategy.clone());
        Ok(executor.execute(content, file_path, language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_strategy() {
        let strategy = ChunkingStrategy {
            max_chunk_tokens: 0,
            ..ChunkingStrategy::small()
        };
        assert!(matches!(
            Chunker::new(strategy),
            Err(ChunkerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_content_is_an_error() {
        let chunker = Chunker::new(ChunkingStrategy::small()).unwrap();
        assert!(matches!(
            chunker.chunk_str("  \n", Some("a.py")),
            Err(ChunkerError::EmptyContent)
        ));
    }

    #[test]
    fn detects_language_from_path() {
        let chunker = Chunker::new(ChunkingStrategy::medium()).unwrap();
        let chunks = chunker
            .chunk_str("def run():\n    return 1\n", Some("job.py"))
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].language, "python");
        assert_eq!(chunks[0].symbol.as_deref(), Some("run"));
    }

    #[test]
    fn chunk_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.rs");
        std::fs::write(&path, "pub fn alpha() {}\n\npub fn beta() {}\n").unwrap();

        let chunker = Chunker::new(ChunkingStrategy::large()).unwrap();
        let chunks = chunker.chunk_file(&path).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.language == "rust"));
    }
}
