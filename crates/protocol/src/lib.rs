//! # Orca Protocol
//!
//! Shared data model for the retrieval core: queries, filters, code
//! context, chunks and validated retrieval results.

mod error;
mod filters;
mod query;
mod result;

pub use error::{ProtocolError, Result};
pub use filters::CompiledFilter;
pub use query::{
    CodeContext, DateRange, Query, QueryKind, RetrievalFilter, DEFAULT_MAX_RESULTS,
    DEFAULT_MIN_SIMILARITY,
};
pub use result::{Chunk, RetrievalResult};

use std::time::{SystemTime, UNIX_EPOCH};

/// Approximate token count used everywhere budgets are computed.
#[must_use]
pub const fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

pub fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_is_quarter_length() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }
}
