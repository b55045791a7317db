//! Adaptive indexing: pick a chunk granularity per file, then chunk, embed
//! and store.
//!
//! ```text
//! source ──► select_granularity(size, definitions, agent window)
//!                 │
//!                 ▼
//!        Chunker(small | medium | large) ──► Embedder::embed_batch
//!                                                   │
//!                                                   ▼
//!                            MemoryVectorStore::upsert ──► EmbeddingStats
//!                                                             │
//!                                     AgentCoordinator ◄──────┘ "vector_store"
//! ```

use crate::embedding_stats::EmbeddingStats;
use crate::error::{IndexerError, Result};
use crate::scanner::FileScanner;
use crate::stats::IndexStats;
use orca_code_chunker::{Chunker, ChunkingStrategy, Granularity, Language};
use orca_coordinator::AgentCoordinator;
use orca_protocol::unix_ms_now;
use orca_vector_store::{Embedder, MemoryVectorStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const KNOWLEDGE_KEY: &str = "vector_store";

const LARGE_SIZE_CHARS: usize = 10_000;
const LARGE_DEFINITIONS: usize = 20;
const LARGE_WINDOW: usize = 1_000_000;
const MEDIUM_SIZE_CHARS: usize = 3_000;
const MEDIUM_DEFINITIONS: usize = 10;
const MEDIUM_WINDOW: usize = 500_000;

const EMBEDDING_HISTORY_LIMIT: usize = 1_000;

/// Lines that open a class or function in any supported language
pub fn count_definitions(content: &str) -> usize {
    content.matches("def ").count()
        + content.matches("class ").count()
        + content.matches("fn ").count()
        + content.matches("function ").count()
}

/// Bigger files, denser files and agents with bigger windows get bigger chunks
pub fn select_granularity(content: &str, agent_window: Option<usize>) -> Granularity {
    let size = content.chars().count();
    let definitions = count_definitions(content);
    let window = agent_window.unwrap_or(0);

    if size > LARGE_SIZE_CHARS || definitions > LARGE_DEFINITIONS || window > LARGE_WINDOW {
        Granularity::Large
    } else if size > MEDIUM_SIZE_CHARS || definitions > MEDIUM_DEFINITIONS || window > MEDIUM_WINDOW
    {
        Granularity::Medium
    } else {
        Granularity::Small
    }
}

/// Running record for one granularity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkPerformance {
    pub runs: u64,
    pub successes: u64,
    /// Over successful runs
    pub avg_chunk_count: f64,
    /// Over successful runs
    pub avg_processing_ms: f64,
}

impl ChunkPerformance {
    #[allow(clippy::cast_precision_loss)]
    fn record(&mut self, success: bool, chunk_count: usize, elapsed: Duration) {
        self.runs += 1;
        if !success {
            return;
        }
        self.successes += 1;
        let n = self.successes as f64;
        self.avg_chunk_count += (chunk_count as f64 - self.avg_chunk_count) / n;
        self.avg_processing_ms += (elapsed.as_secs_f64() * 1000.0 - self.avg_processing_ms) / n;
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            self.successes as f64 / self.runs as f64
        }
    }
}

/// Outcome of indexing one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedSource {
    pub granularity: Granularity,
    pub point_ids: Vec<String>,
}

struct Chunkers {
    small: Chunker,
    medium: Chunker,
    large: Chunker,
}

impl Chunkers {
    fn new() -> Result<Self> {
        Ok(Self {
            small: Chunker::new(ChunkingStrategy::small())?,
            medium: Chunker::new(ChunkingStrategy::medium())?,
            large: Chunker::new(ChunkingStrategy::large())?,
        })
    }

    const fn get(&self, granularity: Granularity) -> &Chunker {
        match granularity {
            Granularity::Small => &self.small,
            Granularity::Medium => &self.medium,
            Granularity::Large => &self.large,
        }
    }
}

pub struct AdaptivePipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<MemoryVectorStore>,
    collection: String,
    coordinator: Option<Arc<AgentCoordinator>>,
    chunkers: Chunkers,
    performance: BTreeMap<Granularity, ChunkPerformance>,
    embedding_history: Vec<EmbeddingStats>,
}

impl AdaptivePipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<MemoryVectorStore>,
        collection: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            embedder,
            store,
            collection: collection.into(),
            coordinator: None,
            chunkers: Chunkers::new()?,
            performance: Granularity::ALL
                .into_iter()
                .map(|g| (g, ChunkPerformance::default()))
                .collect(),
            embedding_history: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_coordinator(mut self, coordinator: Arc<AgentCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn store(&self) -> &Arc<MemoryVectorStore> {
        &self.store
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn performance(&self) -> &BTreeMap<Granularity, ChunkPerformance> {
        &self.performance
    }

    pub fn embedding_history(&self) -> &[EmbeddingStats] {
        &self.embedding_history
    }

    pub async fn select_strategy(&self, content: &str, agent_id: Option<&str>) -> Granularity {
        let window = match (&self.coordinator, agent_id) {
            (Some(coordinator), Some(id)) => coordinator
                .agent_context(id)
                .await
                .map(|ctx| ctx.window_size),
            _ => None,
        };
        let granularity = select_granularity(content, window);
        log::debug!("Selected {} chunking (agent window {window:?})", granularity.as_str());
        granularity
    }

    /// Chunk, embed and store one source under `file_path`.
    ///
    /// Failures are recorded against the selected granularity before they
    /// propagate.
    pub async fn process_source(
        &mut self,
        content: &str,
        file_path: &str,
        agent_id: Option<&str>,
    ) -> Result<ProcessedSource> {
        let granularity = self.select_strategy(content, agent_id).await;
        let started = Instant::now();

        let outcome = self.store_source(granularity, content, file_path).await;
        let (chunk_count, elapsed) = match &outcome {
            Ok((ids, _)) => (ids.len(), started.elapsed()),
            Err(_) => (0, Duration::ZERO),
        };
        if let Some(perf) = self.performance.get_mut(&granularity) {
            perf.record(outcome.is_ok(), chunk_count, elapsed);
        }

        let (point_ids, vectors) = outcome?;
        self.analyze_embeddings(&vectors).await;
        log::debug!(
            "Indexed {file_path}: {} chunks ({})",
            point_ids.len(),
            granularity.as_str()
        );
        Ok(ProcessedSource {
            granularity,
            point_ids,
        })
    }

    pub async fn process_file(
        &mut self,
        path: &Path,
        agent_id: Option<&str>,
    ) -> Result<ProcessedSource> {
        let content = tokio::fs::read_to_string(path).await?;
        self.process_source(&content, &path.to_string_lossy(), agent_id)
            .await
    }

    /// Scan `root` and index every source file; per-file failures are
    /// collected in the stats rather than aborting the run.
    pub async fn index_directory(
        &mut self,
        root: &Path,
        agent_id: Option<&str>,
    ) -> Result<IndexStats> {
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(root.display().to_string()));
        }
        let started = Instant::now();
        let mut stats = IndexStats::new();

        log::info!("Indexing project at {}", root.display());
        for path in FileScanner::new(root).scan() {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");

            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(err) => {
                    log::warn!("Failed to read {relative}: {err}");
                    stats.add_error(format!("{relative}: {err}"));
                    continue;
                }
            };
            if content.trim().is_empty() {
                continue;
            }

            match self.process_source(&content, &relative, agent_id).await {
                Ok(processed) => {
                    let language = Language::from_path(&path);
                    stats.add_file(
                        language.as_str(),
                        content.lines().count(),
                        processed.granularity,
                    );
                    stats.add_chunks(processed.point_ids.len());
                }
                Err(err) => {
                    log::warn!("Failed to process file {relative}: {err}");
                    stats.add_error(format!("{relative}: {err}"));
                }
            }
        }

        stats.time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Indexed {} files into {} chunks ({} errors)",
            stats.files,
            stats.chunks,
            stats.errors.len()
        );
        Ok(stats)
    }

    async fn store_source(
        &self,
        granularity: Granularity,
        content: &str,
        file_path: &str,
    ) -> Result<(Vec<String>, Vec<Vec<f32>>)> {
        let chunker = self.chunkers.get(granularity);
        let now = unix_ms_now();
        let chunks: Vec<_> = chunker
            .chunk_with_language(content, file_path, Language::from_path(file_path))?
            .into_iter()
            .map(|chunk| chunk.indexed_at(now))
            .collect();

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        let ids = self
            .store
            .upsert(&self.collection, chunks, vectors.clone())
            .await?;
        Ok((ids, vectors))
    }

    async fn analyze_embeddings(&mut self, vectors: &[Vec<f32>]) {
        let Some(stats) = EmbeddingStats::compute(vectors, unix_ms_now()) else {
            return;
        };
        if self.embedding_history.len() >= EMBEDDING_HISTORY_LIMIT {
            self.embedding_history.remove(0);
        }
        self.embedding_history.push(stats.clone());

        if let Some(coordinator) = &self.coordinator {
            let value = serde_json::json!({ "embedding_stats": stats });
            coordinator.share_knowledge(KNOWLEDGE_KEY, value).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_vector_store::{HashingEmbedder, VectorSearch};
    use pretty_assertions::assert_eq;

    fn pipeline() -> AdaptivePipeline {
        AdaptivePipeline::new(
            Arc::new(HashingEmbedder::new(64)),
            Arc::new(MemoryVectorStore::new()),
            "code_chunks",
        )
        .unwrap()
    }

    #[test]
    fn granularity_follows_size_density_and_window() {
        assert_eq!(select_granularity("x = 1\n", None), Granularity::Small);
        assert_eq!(select_granularity(&"x".repeat(3_001), None), Granularity::Medium);
        assert_eq!(select_granularity(&"x".repeat(10_001), None), Granularity::Large);

        let dense = "def f():\n    pass\n".repeat(11);
        assert_eq!(select_granularity(&dense, None), Granularity::Medium);
        let denser = "def f():\n    pass\n".repeat(21);
        assert_eq!(select_granularity(&denser, None), Granularity::Large);

        assert_eq!(select_granularity("x", Some(500_000)), Granularity::Small);
        assert_eq!(select_granularity("x", Some(500_001)), Granularity::Medium);
        assert_eq!(select_granularity("x", Some(1_000_001)), Granularity::Large);
    }

    #[tokio::test]
    async fn process_source_stores_searchable_chunks() {
        let mut pipeline = pipeline();
        let source = "def parse_config(path):\n    return load(path)\n\n\ndef save_config(path, data):\n    write(path, data)\n";

        let processed = pipeline
            .process_source(source, "app/config.py", None)
            .await
            .unwrap();
        assert_eq!(processed.granularity, Granularity::Small);
        assert!(!processed.point_ids.is_empty());

        let stored = pipeline.store().payloads("code_chunks").await;
        assert_eq!(stored.len(), processed.point_ids.len());
        assert!(stored.iter().all(|c| c.indexed_at_unix_ms > 0));
        assert!(stored.iter().all(|c| c.language == "python"));

        let query = HashingEmbedder::new(64).embed_sync("parse_config path load");
        let hits = pipeline
            .store()
            .search("code_chunks", &query, 1, None)
            .await
            .unwrap();
        assert_eq!(hits[0].payload.file_path, "app/config.py");

        let perf = &pipeline.performance()[&Granularity::Small];
        assert_eq!(perf.runs, 1);
        assert_eq!(perf.successes, 1);
        assert_eq!(pipeline.embedding_history().len(), 1);
        assert_eq!(pipeline.embedding_history()[0].dimension, 64);
    }

    #[tokio::test]
    async fn failures_are_recorded_and_propagated() {
        let mut pipeline = pipeline();
        let err = pipeline
            .process_source("   \n", "empty.py", None)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::ChunkerError(_)));

        let perf = &pipeline.performance()[&Granularity::Small];
        assert_eq!(perf.runs, 1);
        assert_eq!(perf.successes, 0);
        assert_eq!(perf.success_rate(), 0.0);
        assert!(pipeline.embedding_history().is_empty());
    }

    #[tokio::test]
    async fn agent_window_and_stats_flow_through_coordinator() {
        let coordinator = Arc::new(AgentCoordinator::new(orca_coordinator::CoordinatorConfig {
            total_context_window: 4_000_000,
            default_agent_window: 2_000_000,
            ..orca_coordinator::CoordinatorConfig::default()
        }));
        coordinator.register_agent("security").await;
        let mut pipeline = pipeline().with_coordinator(coordinator.clone());

        let processed = pipeline
            .process_source("fn main() {\n    run();\n}\n", "src/main.rs", Some("security"))
            .await
            .unwrap();
        assert_eq!(processed.granularity, Granularity::Large);

        let knowledge = coordinator.knowledge(KNOWLEDGE_KEY).await.unwrap();
        assert_eq!(knowledge["embedding_stats"]["dimension"], 64);
    }
}
