//! # Orca Indexer
//!
//! Turns a project directory into a searchable in-memory collection.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore aware)
//!     │      └─> Source files
//!     │
//!     ├──> AdaptivePipeline
//!     │      ├─> granularity per file (size, definitions, agent window)
//!     │      └─> Chunker (small | medium | large)
//!     │
//!     └──> Vector Store (batch embed + upsert)
//!            └─> Searchable collection, embedding stats
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use orca_indexer::AdaptivePipeline;
//! use orca_vector_store::{HashingEmbedder, MemoryVectorStore};
//!
//! #[tokio::main]
//! async fn main() -> orca_indexer::Result<()> {
//!     let store = Arc::new(MemoryVectorStore::new());
//!     let mut pipeline =
//!         AdaptivePipeline::new(Arc::new(HashingEmbedder::default()), store, "code_chunks")?;
//!     let stats = pipeline.index_directory(Path::new("/path/to/project"), None).await?;
//!
//!     println!("Indexed {} files, {} chunks", stats.files, stats.chunks);
//!     Ok(())
//! }
//! ```

mod embedding_stats;
mod error;
mod pipeline;
mod scanner;
mod stats;

pub use embedding_stats::EmbeddingStats;
pub use error::{IndexerError, Result};
pub use pipeline::{
    count_definitions, select_granularity, AdaptivePipeline, ChunkPerformance, ProcessedSource,
    KNOWLEDGE_KEY,
};
pub use scanner::{FileScanner, ScanOptions};
pub use stats::IndexStats;
