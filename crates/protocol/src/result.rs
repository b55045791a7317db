use crate::error::{ProtocolError, Result};
use crate::query::{check_similarity, CodeContext, Query};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A retrieved unit of code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source file path
    pub file_path: String,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    pub content: String,

    pub language: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// When the chunk entered the index
    #[serde(default)]
    pub indexed_at_unix_ms: u64,
}

impl Chunk {
    #[must_use]
    pub const fn new(
        file_path: String,
        start_line: usize,
        end_line: usize,
        content: String,
        language: String,
    ) -> Self {
        Self {
            file_path,
            start_line,
            end_line,
            content,
            language,
            chunk_type: None,
            symbol: None,
            indexed_at_unix_ms: 0,
        }
    }

    #[must_use]
    pub fn chunk_type(mut self, chunk_type: impl Into<String>) -> Self {
        self.chunk_type = Some(chunk_type.into());
        self
    }

    #[must_use]
    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub const fn indexed_at(mut self, unix_ms: u64) -> Self {
        self.indexed_at_unix_ms = unix_ms;
        self
    }

    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    #[must_use]
    pub fn estimated_tokens(&self) -> usize {
        crate::estimate_tokens(&self.content)
    }
}

/// Outcome of one retrieval.
///
/// Only [`RetrievalResult::new`] and [`RetrievalResult::error_only`] build
/// values, and deserialization runs the same checks, so every instance has
/// one score per chunk, non-empty chunk content, and scores inside `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRetrievalResult")]
pub struct RetrievalResult {
    query: Query,
    chunks: Vec<Chunk>,
    similarity_scores: Vec<f32>,
    #[serde(with = "duration_secs")]
    execution_time: Duration,
    total_chunks_searched: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<CodeContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RetrievalResult {
    pub fn new(
        query: Query,
        chunks: Vec<Chunk>,
        similarity_scores: Vec<f32>,
        execution_time: Duration,
        total_chunks_searched: usize,
    ) -> Result<Self> {
        if chunks.len() != similarity_scores.len() {
            return Err(ProtocolError::LengthMismatch {
                chunks: chunks.len(),
                scores: similarity_scores.len(),
            });
        }
        if let Some(index) = chunks.iter().position(|c| c.content.is_empty()) {
            return Err(ProtocolError::EmptyChunk { index });
        }
        for score in &similarity_scores {
            check_similarity(*score)?;
        }

        Ok(Self {
            query,
            chunks,
            similarity_scores,
            execution_time,
            total_chunks_searched,
            context: None,
            error: None,
        })
    }

    /// Empty result tagged with an error message; the last-resort fallback.
    pub fn error_only(query: Query, message: impl Into<String>) -> Self {
        Self {
            query,
            chunks: Vec::new(),
            similarity_scores: Vec::new(),
            execution_time: Duration::ZERO,
            total_chunks_searched: 0,
            context: None,
            error: Some(message.into()),
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: Option<CodeContext>) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub const fn with_execution_time(mut self, execution_time: Duration) -> Self {
        self.execution_time = execution_time;
        self
    }

    pub const fn query(&self) -> &Query {
        &self.query
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn similarity_scores(&self) -> &[f32] {
        &self.similarity_scores
    }

    /// Chunks paired with their scores.
    pub fn scored_chunks(&self) -> impl Iterator<Item = (&Chunk, f32)> {
        self.chunks.iter().zip(self.similarity_scores.iter().copied())
    }

    pub const fn execution_time(&self) -> Duration {
        self.execution_time
    }

    pub const fn total_chunks_searched(&self) -> usize {
        self.total_chunks_searched
    }

    pub const fn context(&self) -> Option<&CodeContext> {
        self.context.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Mean similarity score, 0.0 without scores.
    pub fn relevance(&self) -> f32 {
        if self.similarity_scores.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = self.similarity_scores.len() as f32;
        self.similarity_scores.iter().sum::<f32>() / count
    }
}

#[derive(Deserialize)]
struct RawRetrievalResult {
    query: Query,
    chunks: Vec<Chunk>,
    similarity_scores: Vec<f32>,
    #[serde(with = "duration_secs")]
    execution_time: Duration,
    total_chunks_searched: usize,
    #[serde(default)]
    context: Option<CodeContext>,
    #[serde(default)]
    error: Option<String>,
}

impl TryFrom<RawRetrievalResult> for RetrievalResult {
    type Error = ProtocolError;

    fn try_from(raw: RawRetrievalResult) -> Result<Self> {
        let mut result = Self::new(
            raw.query,
            raw.chunks,
            raw.similarity_scores,
            raw.execution_time,
            raw.total_chunks_searched,
        )?
        .with_context(raw.context);
        result.error = raw.error;
        Ok(result)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn chunk(content: &str) -> Chunk {
        Chunk::new(
            "src/lib.rs".to_string(),
            1,
            3,
            content.to_string(),
            "rust".to_string(),
        )
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = RetrievalResult::new(
            Query::new("q"),
            vec![chunk("fn a() {}")],
            vec![0.9, 0.8],
            Duration::ZERO,
            2,
        )
        .unwrap_err();
        assert_eq!(err, ProtocolError::LengthMismatch { chunks: 1, scores: 2 });
    }

    #[test]
    fn rejects_empty_content_and_bad_scores() {
        assert_eq!(
            RetrievalResult::new(
                Query::new("q"),
                vec![chunk("x"), chunk("")],
                vec![0.5, 0.5],
                Duration::ZERO,
                2
            )
            .unwrap_err(),
            ProtocolError::EmptyChunk { index: 1 }
        );
        assert!(RetrievalResult::new(
            Query::new("q"),
            vec![chunk("x")],
            vec![1.2],
            Duration::ZERO,
            1
        )
        .is_err());
        assert!(RetrievalResult::new(
            Query::new("q"),
            vec![chunk("x")],
            vec![f32::NAN],
            Duration::ZERO,
            1
        )
        .is_err());
    }

    #[test]
    fn relevance_is_mean_score() {
        let result = RetrievalResult::new(
            Query::new("q"),
            vec![chunk("a"), chunk("b")],
            vec![0.6, 1.0],
            Duration::from_millis(5),
            4,
        )
        .unwrap();
        assert!((result.relevance() - 0.8).abs() < 1e-6);
        assert_eq!(RetrievalResult::error_only(Query::new("q"), "boom").relevance(), 0.0);
    }

    #[test]
    fn deserialization_runs_validation() {
        let good = RetrievalResult::new(
            Query::new("q"),
            vec![chunk("a")],
            vec![0.75],
            Duration::from_millis(250),
            3,
        )
        .unwrap();
        let json = serde_json::to_value(&good).unwrap();
        let back: RetrievalResult = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, good);

        let mut broken = json;
        broken["similarity_scores"] = serde_json::json!([0.75, 0.1]);
        assert!(serde_json::from_value::<RetrievalResult>(broken).is_err());
    }

    #[test]
    fn error_only_is_tagged_and_empty() {
        let result = RetrievalResult::error_only(Query::new("q"), "upstream down");
        assert!(result.is_empty());
        assert_eq!(result.error(), Some("upstream down"));
    }

    proptest! {
        #[test]
        fn accepted_results_keep_chunks_and_scores_aligned(
            scores in proptest::collection::vec(-0.5f32..1.5f32, 0..8),
            extra in 0usize..2,
        ) {
            let chunks: Vec<Chunk> = (0..scores.len() + extra).map(|i| chunk(&format!("c{i}"))).collect();
            let outcome = RetrievalResult::new(Query::new("q"), chunks, scores.clone(), Duration::ZERO, 10);
            let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
            match outcome {
                Ok(result) => {
                    prop_assert_eq!(extra, 0);
                    prop_assert!(in_range);
                    prop_assert_eq!(result.chunks().len(), result.similarity_scores().len());
                }
                Err(_) => prop_assert!(extra != 0 || !in_range),
            }
        }
    }
}
