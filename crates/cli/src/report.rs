use orca_indexer::IndexStats;
use orca_metadata::{CodeMetadata, ExtractionStrategy};
use orca_protocol::RetrievalResult;
use orca_retrieval::{
    CacheStats, ContextUsage, FailureStats, PerformanceSummary, QueryPerformance, StrategyTier,
};
use serde::Serialize;
use std::collections::BTreeMap;

const PREVIEW_CHARS: usize = 160;

/// Output of `orca query`
#[derive(Debug, Serialize)]
pub struct QueryReport {
    pub query: String,
    pub runs: usize,
    pub index: IndexStats,
    pub results: Vec<ResultEntry>,
    pub relevance: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub performance: PerformanceSummary,
    pub strategies: BTreeMap<StrategyTier, QueryPerformance>,
    pub cache: CacheStats,
    pub context: ContextUsage,
    pub failures: FailureStats,
}

#[derive(Debug, Serialize)]
pub struct ResultEntry {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub score: f32,
    pub preview: String,
}

impl ResultEntry {
    pub fn from_result(result: &RetrievalResult) -> Vec<Self> {
        result
            .scored_chunks()
            .map(|(chunk, score)| Self {
                file_path: chunk.file_path.clone(),
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                language: chunk.language.clone(),
                symbol: chunk.symbol.clone(),
                score,
                preview: preview(&chunk.content),
            })
            .collect()
    }
}

/// Output of `orca metadata`
#[derive(Debug, Serialize)]
pub struct MetadataReport {
    pub path: String,
    pub strategy: String,
    pub metadata: CodeMetadata,
    pub strategies: Vec<ExtractionStrategy>,
}

fn preview(content: &str) -> String {
    let line = content.trim().lines().next().unwrap_or_default();
    if line.chars().count() <= PREVIEW_CHARS {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}
