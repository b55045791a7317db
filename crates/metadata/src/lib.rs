//! # Orca Metadata
//!
//! Structural metadata for source files: imports, definitions, call sites,
//! annotated types, docstrings and a complexity score.
//!
//! ```text
//! source ──► AdaptiveMetadataManager ── complexity ──► quick | deep | comprehensive
//!                     │                                        │
//!                     ▼                                        ▼
//!             MetadataExtractor ◄──────────────────── MetadataRequest
//!            (HeuristicExtractor)
//!                     │
//!                     ▼
//!               CodeMetadata ──► learned `<section>_structure` patterns
//! ```

mod complexity;
mod error;
mod extractor;
mod manager;
mod types;

pub use complexity::{estimate_complexity, ComplexityFactors};
pub use error::{MetadataError, Result};
pub use extractor::{HeuristicExtractor, MetadataExtractor};
pub use manager::{AdaptiveMetadataManager, ExtractionStrategy, LearnedPattern, StrategyName};
pub use types::{ClassInfo, CodeMetadata, ExtractionLevel, FunctionInfo, MetadataRequest};
