use crate::error::{ProtocolError, Result};
use crate::query::RetrievalFilter;
use crate::result::Chunk;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// A [`RetrievalFilter`] compiled for repeated matching against chunks.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    languages: Vec<String>,
    chunk_types: Vec<String>,
    substrings: Vec<String>,
    globs: Option<GlobSet>,
    date_range: Option<crate::DateRange>,
}

impl CompiledFilter {
    pub fn compile(filter: &RetrievalFilter) -> Result<Self> {
        let mut substrings = Vec::new();
        let mut builder = GlobSetBuilder::new();
        let mut has_globs = false;

        for raw in &filter.file_patterns {
            let pattern = normalize_filter_path(raw);
            if pattern.is_empty() {
                continue;
            }
            if !pattern.contains(['*', '?', '[']) {
                substrings.push(pattern);
                continue;
            }
            let glob = Glob::new(&pattern).map_err(|e| ProtocolError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
            has_globs = true;
        }

        let globs = if has_globs {
            Some(builder.build().map_err(|e| ProtocolError::InvalidPattern {
                pattern: filter.file_patterns.join(","),
                reason: e.to_string(),
            })?)
        } else {
            None
        };

        Ok(Self {
            languages: filter
                .languages
                .iter()
                .map(|l| l.trim().to_ascii_lowercase())
                .collect(),
            chunk_types: filter
                .chunk_types
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .collect(),
            substrings,
            globs,
            date_range: filter.date_range,
        })
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        if !self.languages.is_empty()
            && !self
                .languages
                .iter()
                .any(|lang| chunk.language.eq_ignore_ascii_case(lang))
        {
            return false;
        }

        if !self.chunk_types.is_empty() {
            let Some(chunk_type) = chunk.chunk_type.as_deref() else {
                return false;
            };
            if !self
                .chunk_types
                .iter()
                .any(|t| chunk_type.eq_ignore_ascii_case(t))
            {
                return false;
            }
        }

        if let Some(range) = &self.date_range {
            if !range.contains(chunk.indexed_at_unix_ms) {
                return false;
            }
        }

        self.path_allowed(&chunk.file_path)
    }

    fn path_allowed(&self, path: &str) -> bool {
        if self.substrings.is_empty() && self.globs.is_none() {
            return true;
        }
        let path = path.replace('\\', "/");
        self.substrings.iter().any(|s| path.contains(s.as_str()))
            || self.globs.as_ref().is_some_and(|set| set.is_match(&path))
    }
}

fn normalize_filter_path(raw: &str) -> String {
    let mut value = raw.trim().replace('\\', "/");
    while let Some(rest) = value.strip_prefix("./") {
        value = rest.to_string();
    }
    value
}
