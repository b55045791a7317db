use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How much of a file's structure to extract
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionLevel {
    /// Imports and definition signatures
    Minimal,
    /// Adds types, dependencies and docstrings (subject to the request flags)
    #[default]
    Standard,
    /// Adds call sites
    Deep,
    /// Adds the complexity score
    Comprehensive,
}

impl ExtractionLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Deep => "deep",
            Self::Comprehensive => "comprehensive",
        }
    }

    pub fn includes(self, other: Self) -> bool {
        self >= other
    }
}

/// Extraction parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataRequest {
    pub extraction_level: ExtractionLevel,
    pub include_types: bool,
    pub include_dependencies: bool,
    /// Module path segments kept in dependency keys (`None` keeps all)
    pub max_dependency_depth: Option<usize>,
    pub include_docstrings: bool,
    pub include_comments: bool,
}

impl Default for MetadataRequest {
    fn default() -> Self {
        Self {
            extraction_level: ExtractionLevel::Standard,
            include_types: true,
            include_dependencies: true,
            max_dependency_depth: None,
            include_docstrings: true,
            include_comments: false,
        }
    }
}

impl MetadataRequest {
    pub fn new(level: ExtractionLevel) -> Self {
        Self {
            extraction_level: level,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn include_types(mut self, include: bool) -> Self {
        self.include_types = include;
        self
    }

    #[must_use]
    pub const fn include_dependencies(mut self, include: bool) -> Self {
        self.include_dependencies = include;
        self
    }

    #[must_use]
    pub const fn max_dependency_depth(mut self, depth: Option<usize>) -> Self {
        self.max_dependency_depth = depth;
        self
    }

    #[must_use]
    pub const fn include_docstrings(mut self, include: bool) -> Self {
        self.include_docstrings = include;
        self
    }

    #[must_use]
    pub const fn include_comments(mut self, include: bool) -> Self {
        self.include_comments = include;
        self
    }

    pub(crate) fn wants_types(&self) -> bool {
        self.include_types && self.extraction_level.includes(ExtractionLevel::Standard)
    }

    pub(crate) fn wants_dependencies(&self) -> bool {
        self.include_dependencies && self.extraction_level.includes(ExtractionLevel::Standard)
    }

    pub(crate) fn wants_docstrings(&self) -> bool {
        self.include_docstrings && self.extraction_level.includes(ExtractionLevel::Standard)
    }

    pub(crate) fn wants_calls(&self) -> bool {
        self.extraction_level.includes(ExtractionLevel::Deep)
    }

    pub(crate) fn wants_complexity(&self) -> bool {
        self.extraction_level.includes(ExtractionLevel::Comprehensive)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub params: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    pub is_async: bool,
    /// 1-based
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub bases: Vec<String>,
    pub line: usize,
}

/// Structure extracted from one source file or chunk.
///
/// Sections the request did not ask for stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeMetadata {
    pub imports: Vec<String>,
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<ClassInfo>,
    pub calls: Vec<String>,
    /// module -> imported names
    pub dependencies: BTreeMap<String, Vec<String>>,
    /// `function.param` / `function.return` -> annotated type
    pub types: BTreeMap<String, String>,
    /// definition name -> first docstring line
    pub docstrings: BTreeMap<String, String>,
    pub comments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<f64>,
}

impl CodeMetadata {
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|f| f.name.as_str())
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|c| c.name.as_str())
    }
}
