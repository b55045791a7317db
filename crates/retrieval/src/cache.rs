use crate::config::CacheConfig;
use lru::LruCache;
use orca_protocol::{Query, RetrievalFilter, RetrievalResult};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry {
    result: RetrievalResult,
    inserted_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hit_rate: f64,
    pub hits: u64,
    pub misses: u64,
}

/// TTL + size bounded cache of retrieval results.
///
/// Entries are keyed by a blake3 digest of the normalised query; a hit also
/// needs the raw text and kind of the cached query to match exactly, so
/// queries that only normalise alike never share a result. Lookups never
/// refresh recency, so the least recently used entry is always the oldest
/// insertion and is the one evicted at capacity.
pub struct ResultCache {
    entries: LruCache<blake3::Hash, CacheEntry>,
    ttl: Duration,
    max_size: usize,
    hits: u64,
    misses: u64,
}

impl ResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl: config.ttl(),
            max_size: capacity.get(),
            hits: 0,
            misses: 0,
        }
    }

    /// Digest of (normalised text, kind, filters, max_results)
    pub fn cache_key(query: &Query) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(normalize_text(&query.text).as_bytes());
        hasher.update(b"\0");
        hasher.update(query.kind.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(&(query.max_results as u64).to_le_bytes());
        if let Some(filters) = &query.filters {
            hasher.update(b"\0filters\0");
            hash_filter(&mut hasher, filters);
        }
        hasher.finalize()
    }

    pub fn get(&mut self, query: &Query) -> Option<RetrievalResult> {
        self.get_at(query, Instant::now())
    }

    pub fn get_at(&mut self, query: &Query, now: Instant) -> Option<RetrievalResult> {
        let key = Self::cache_key(query);
        let expired = match self.entries.peek(&key) {
            Some(entry) => self.is_expired(entry, now),
            None => {
                self.misses += 1;
                return None;
            }
        };
        if expired {
            self.entries.pop(&key);
            self.misses += 1;
            log::debug!("Cache entry expired for '{}'", query.text);
            return None;
        }

        match self.lookup_at(query, now) {
            Some(result) => {
                self.hits += 1;
                log::debug!("Cache hit for '{}'", query.text);
                Some(result)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Live entry for `query`, leaving counters and expired entries alone
    pub fn lookup(&self, query: &Query) -> Option<RetrievalResult> {
        self.lookup_at(query, Instant::now())
    }

    pub fn lookup_at(&self, query: &Query, now: Instant) -> Option<RetrievalResult> {
        let entry = self.entries.peek(&Self::cache_key(query))?;
        if self.is_expired(entry, now) {
            return None;
        }
        let cached = entry.result.query();
        (cached.kind == query.kind && cached.text == query.text).then(|| entry.result.clone())
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) > self.ttl
    }

    pub fn put(&mut self, query: &Query, result: RetrievalResult) {
        self.put_at(query, result, Instant::now());
    }

    pub fn put_at(&mut self, query: &Query, result: RetrievalResult, now: Instant) {
        let key = Self::cache_key(query);
        let displaced = self.entries.push(
            key,
            CacheEntry {
                result,
                inserted_at: now,
            },
        );
        if matches!(displaced, Some((old, _)) if old != key) {
            log::debug!("Cache full ({}), evicted oldest entry", self.max_size);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        };
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_size,
            hit_rate,
            hits: self.hits,
            misses: self.misses,
        }
    }
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn hash_filter(hasher: &mut blake3::Hasher, filter: &RetrievalFilter) {
    for list in [&filter.languages, &filter.chunk_types, &filter.file_patterns] {
        let mut values: Vec<String> = list.iter().map(|v| v.trim().to_lowercase()).collect();
        values.sort();
        values.dedup();
        for value in values {
            hasher.update(value.as_bytes());
            hasher.update(b"\x1f");
        }
        hasher.update(b"\x1e");
    }
    hasher.update(&filter.min_similarity.to_bits().to_le_bytes());
    hasher.update(&(filter.max_results as u64).to_le_bytes());
    if let Some(range) = &filter.date_range {
        hasher.update(&range.start_unix_ms.to_le_bytes());
        hasher.update(&range.end_unix_ms.to_le_bytes());
    }
}
