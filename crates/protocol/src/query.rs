use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_MAX_RESULTS: usize = 10;
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.7;

/// What the caller is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    #[default]
    CodeSearch,
    SemanticSearch,
    DependencySearch,
    ContextSearch,
}

impl QueryKind {
    pub const ALL: [Self; 4] = [
        Self::CodeSearch,
        Self::SemanticSearch,
        Self::DependencySearch,
        Self::ContextSearch,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CodeSearch => "code_search",
            Self::SemanticSearch => "semantic_search",
            Self::DependencySearch => "dependency_search",
            Self::ContextSearch => "context_search",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|kind| kind.as_str() == normalized)
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open interval of unix milliseconds used to restrict results by index time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start_unix_ms: u64,
    pub end_unix_ms: u64,
}

impl DateRange {
    pub fn new(start_unix_ms: u64, end_unix_ms: u64) -> Result<Self> {
        let range = Self {
            start_unix_ms,
            end_unix_ms,
        };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_unix_ms >= self.end_unix_ms {
            return Err(ProtocolError::InvalidDateRange {
                start: self.start_unix_ms,
                end: self.end_unix_ms,
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn contains(&self, unix_ms: u64) -> bool {
        unix_ms >= self.start_unix_ms && unix_ms < self.end_unix_ms
    }
}

/// Constraints applied to candidate chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunk_types: Vec<String>,

    /// Substring or glob patterns matched against the chunk's file path
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_patterns: Vec<String>,

    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

const fn default_min_similarity() -> f32 {
    DEFAULT_MIN_SIMILARITY
}

const fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl Default for RetrievalFilter {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            chunk_types: Vec::new(),
            file_patterns: Vec::new(),
            min_similarity: DEFAULT_MIN_SIMILARITY,
            max_results: DEFAULT_MAX_RESULTS,
            date_range: None,
        }
    }
}

impl RetrievalFilter {
    #[must_use]
    pub fn languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn chunk_types<I, S>(mut self, chunk_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunk_types = chunk_types.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn file_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Number of constraints that actually narrow the candidate set.
    #[must_use]
    pub fn active_constraints(&self) -> usize {
        usize::from(!self.languages.is_empty())
            + usize::from(!self.chunk_types.is_empty())
            + usize::from(!self.file_patterns.is_empty())
            + usize::from(self.date_range.is_some())
    }

    pub fn validate(&self) -> Result<()> {
        check_similarity(self.min_similarity)?;
        if self.max_results == 0 {
            return Err(ProtocolError::ZeroMaxResults);
        }
        if let Some(range) = &self.date_range {
            range.validate()?;
        }
        Ok(())
    }
}

/// Code the caller is currently looking at, optionally enriched with
/// imports, callers and related files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeContext {
    pub code_snippet: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub callers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_files: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_language() -> String {
    "python".to_string()
}

impl Default for CodeContext {
    fn default() -> Self {
        Self {
            code_snippet: String::new(),
            file_path: None,
            start_line: None,
            end_line: None,
            language: default_language(),
            imports: Vec::new(),
            dependencies: Vec::new(),
            callers: Vec::new(),
            related_files: Vec::new(),
            documentation: None,
            metadata: BTreeMap::new(),
        }
    }
}

impl CodeContext {
    pub fn new(code_snippet: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code_snippet: code_snippet.into(),
            language: language.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn documentation(mut self, text: impl Into<String>) -> Self {
        self.documentation = Some(text.into());
        self
    }

    #[must_use]
    pub fn metadata_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A retrieval request. Treated as immutable once handed to a pipeline;
/// enhancement works on a copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,

    #[serde(default)]
    pub kind: QueryKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<RetrievalFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CodeContext>,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    #[serde(default = "default_include_context")]
    pub include_context: bool,
}

const fn default_include_context() -> bool {
    true
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: QueryKind::default(),
            filters: None,
            context: None,
            max_results: DEFAULT_MAX_RESULTS,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            include_context: true,
        }
    }

    #[must_use]
    pub const fn kind(mut self, kind: QueryKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: RetrievalFilter) -> Self {
        self.filters = Some(filters);
        self
    }

    #[must_use]
    pub fn context(mut self, context: CodeContext) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub const fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    #[must_use]
    pub const fn min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    #[must_use]
    pub const fn include_context(mut self, include: bool) -> Self {
        self.include_context = include;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(ProtocolError::EmptyQuery);
        }
        if self.max_results == 0 {
            return Err(ProtocolError::ZeroMaxResults);
        }
        check_similarity(self.min_similarity)?;
        if let Some(filters) = &self.filters {
            filters.validate()?;
        }
        Ok(())
    }
}

pub(crate) fn check_similarity(value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ProtocolError::SimilarityOutOfRange(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn query_defaults() {
        let query = Query::new("find parser");
        assert_eq!(query.kind, QueryKind::CodeSearch);
        assert_eq!(query.max_results, 10);
        assert!((query.min_similarity - 0.7).abs() < f32::EPSILON);
        assert!(query.include_context);
        assert!(query.filters.is_none());
        assert!(query.validate().is_ok());
    }

    #[test]
    fn query_validation_rejects_bad_values() {
        assert_eq!(Query::new("   ").validate(), Err(ProtocolError::EmptyQuery));
        assert_eq!(
            Query::new("x").max_results(0).validate(),
            Err(ProtocolError::ZeroMaxResults)
        );
        assert!(Query::new("x").min_similarity(1.5).validate().is_err());

        let bad_range = RetrievalFilter::default().date_range(DateRange {
            start_unix_ms: 10,
            end_unix_ms: 10,
        });
        assert!(Query::new("x").filters(bad_range).validate().is_err());
    }

    #[test]
    fn date_range_requires_start_before_end() {
        assert!(DateRange::new(1, 2).is_ok());
        assert!(DateRange::new(2, 2).is_err());
        assert!(DateRange::new(3, 2).is_err());
        let range = DateRange::new(100, 200).unwrap();
        assert!(range.contains(100));
        assert!(!range.contains(200));
    }

    #[test]
    fn active_constraints_ignores_thresholds() {
        let filter = RetrievalFilter::default();
        assert_eq!(filter.active_constraints(), 0);

        let filter = RetrievalFilter::default()
            .languages(["rust"])
            .file_patterns(["src/*.rs"]);
        assert_eq!(filter.active_constraints(), 2);
    }

    #[test]
    fn query_kind_parse_and_serde() {
        assert_eq!(QueryKind::parse("context-search"), Some(QueryKind::ContextSearch));
        assert_eq!(QueryKind::parse("nope"), None);
        let json = serde_json::to_string(&QueryKind::DependencySearch).unwrap();
        assert_eq!(json, "\"dependency_search\"");
    }

    #[test]
    fn code_context_default_matches_wire_default() {
        let context = CodeContext::default();
        assert_eq!(context.language, "python");

        let parsed: CodeContext = serde_json::from_str(r#"{"code_snippet":""}"#).unwrap();
        assert_eq!(parsed, context);

        let built = CodeContext::new("load()", "rust");
        assert_eq!(built.language, "rust");
        assert!(built.related_files.is_empty());
    }

    #[test]
    fn query_deserializes_with_defaults() {
        let query: Query = serde_json::from_str(r#"{"text":"auth flow"}"#).unwrap();
        assert_eq!(query, Query::new("auth flow"));
    }
}
