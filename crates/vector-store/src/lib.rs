//! # Orca Vector Store
//!
//! Embedding and similarity-search collaborators for the retrieval core.
//!
//! ## Architecture
//!
//! ```text
//! Chunk[]
//!     │
//!     ├──> Embedder (trait; HashingEmbedder offline default)
//!     │      └─> Vector[dimension]
//!     │
//!     └──> MemoryVectorStore (per-collection FlatIndex)
//!            └─> VectorSearch::search(collection, vector, limit, filter)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use orca_vector_store::{Embedder, HashingEmbedder, MemoryVectorStore, VectorSearch};
//!
//! #[tokio::main]
//! async fn main() -> orca_vector_store::Result<()> {
//!     let store = MemoryVectorStore::new();
//!     let embedder = HashingEmbedder::default();
//!
//!     let chunks = vec![/* Chunk instances */];
//!     let texts: Vec<&str> = Vec::new();
//!     let vectors = embedder.embed_batch(&texts).await?;
//!     store.upsert("code_chunks", chunks, vectors).await?;
//!
//!     let query = embedder.embed("error handling").await?;
//!     for hit in store.search("code_chunks", &query, 10, None).await? {
//!         println!("{}: {:.3}", hit.payload.file_path, hit.score);
//!     }
//!     Ok(())
//! }
//! ```

mod embeddings;
mod error;
mod flat_index;
mod store;
mod types;

pub use embeddings::{cosine_similarity, magnitude, Embedder, HashingEmbedder, DEFAULT_DIMENSION};
pub use error::{Result, VectorStoreError};
pub use flat_index::FlatIndex;
pub use store::{MemoryVectorStore, VectorSearch};
pub use types::ScoredPoint;
