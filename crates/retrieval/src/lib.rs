//! # Orca Retrieval
//!
//! Adaptive retrieval and caching core: decides how much of a bounded token
//! budget to spend, what to fetch, what to keep, and how to degrade when the
//! upstream path fails.
//!
//! ## Architecture
//!
//! ```text
//! RetrievalPipeline ──(retry loop)──► FallbackManager
//!        │                                 │ FallbackBackend
//!        ▼                                 ▼
//! AdaptiveRetriever ─┬─ ResultCache (blake3 key, TTL, LRU order)
//!                    ├─ RateLimiter (token bucket + 60s window)
//!                    ├─ ContextManager ─► ContextWindow
//!                    ├─ MetricsTracker / ResponseValidator
//!                    └─ Retriever (VectorRetriever: Embedder + VectorSearch,
//!                                  ContextEnricher, FuzzySearch local path)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use orca_protocol::Query;
//! use orca_retrieval::{AdaptiveRetriever, RetrievalConfig, RetrievalPipeline, VectorRetriever};
//! use orca_vector_store::{HashingEmbedder, MemoryVectorStore};
//!
//! #[tokio::main]
//! async fn main() -> orca_retrieval::Result<()> {
//!     let config = RetrievalConfig::default();
//!     let store = Arc::new(MemoryVectorStore::new());
//!     let base = VectorRetriever::over_memory_store(
//!         Arc::new(HashingEmbedder::default()),
//!         store,
//!         config.collection.clone(),
//!     );
//!     let retriever = Arc::new(AdaptiveRetriever::new(&config, Arc::new(base)));
//!     let mut pipeline = RetrievalPipeline::new(&config, retriever);
//!
//!     let result = pipeline.retrieve(&Query::new("error handling"), None).await?;
//!     println!("{} chunks", result.len());
//!     Ok(())
//! }
//! ```

mod adaptive;
mod cache;
mod config;
mod context;
mod enrich;
mod error;
mod fallback;
mod fuzzy;
mod metrics;
mod pipeline;
mod rate_limit;
mod retriever;
mod strategy;

pub use adaptive::{AdaptiveRetriever, PatternKind, QueryPattern, KNOWLEDGE_KEY};
pub use cache::{CacheStats, ResultCache};
pub use config::{
    CacheConfig, ContextConfig, FallbackConfig, MetricsConfig, RateLimitConfig, RetrievalConfig,
    DEFAULT_COLLECTION,
};
pub use context::{estimate_result_tokens, ContextManager, ContextUsage, ContextWindow, WindowEntry};
pub use enrich::{ContextEnricher, HeuristicEnricher};
pub use error::{Result, RetrievalError};
pub use fallback::{
    FailureStats, FallbackBackend, FallbackManager, FallbackOutcome, FallbackStrategy,
};
pub use fuzzy::FuzzySearch;
pub use metrics::{
    HealthStatus, KindBreakdown, MetricsTracker, PerformanceSummary, ResponseValidator,
    RetrievalMetrics, SummaryWindow, ValidationReport,
};
pub use pipeline::RetrievalPipeline;
pub use rate_limit::{Admission, RateLimiter};
pub use retriever::{ChunkSource, Retriever, VectorRetriever};
pub use strategy::{estimate_query_complexity, QueryPerformance, SearchParams, StrategyTier};
