//! # Orca Code Chunker
//!
//! Size-bounded chunking of source files for embedding and retrieval.
//!
//! ## Architecture
//!
//! ```text
//! Source Code
//!     │
//!     ├──> Language Detection (from extension)
//!     │
//!     ├──> Segmentation
//!     │    ├─> Strategy markers ("class ", "def ", blank lines, ...)
//!     │    └─> Language definition markers ("fn ", "impl ", ...)
//!     │
//!     └──> Sizing (ChunkingStrategy)
//!          ├─> Combine small neighbours
//!          ├─> Split oversized segments with overlap
//!          └─> Emit Chunk[] with type and symbol
//! ```
//!
//! ## Example
//!
//! ```rust
//! use orca_code_chunker::{Chunker, ChunkingStrategy};
//!
//! let chunker = Chunker::new(ChunkingStrategy::small()).unwrap();
//! let chunks = chunker
//!     .chunk_str("def load(path):\n    return open(path).read()\n", Some("io.py"))
//!     .unwrap();
//! assert_eq!(chunks[0].symbol.as_deref(), Some("load"));
//! ```

mod chunker;
mod config;
mod error;
mod language;
mod strategy;

pub use chunker::Chunker;
pub use config::{ChunkingStrategy, Granularity};
pub use error::{ChunkerError, Result};
pub use language::Language;
pub use strategy::StrategyExecutor;
