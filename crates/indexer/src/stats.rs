use orca_code_chunker::Granularity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics about indexing operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of files processed
    pub files: usize,

    /// Number of chunks created
    pub chunks: usize,

    /// Total lines of code
    pub total_lines: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Languages found
    pub languages: BTreeMap<String, usize>,

    /// Files per chunking granularity
    pub granularities: BTreeMap<Granularity, usize>,

    /// Errors encountered
    pub errors: Vec<String>,
}

impl IndexStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, language: &str, lines: usize, granularity: Granularity) {
        self.files += 1;
        self.total_lines += lines;
        *self.languages.entry(language.to_string()).or_insert(0) += 1;
        *self.granularities.entry(granularity).or_insert(0) += 1;
    }

    pub fn add_chunks(&mut self, count: usize) {
        self.chunks += count;
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }
}
