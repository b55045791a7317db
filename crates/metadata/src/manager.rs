use crate::complexity::estimate_complexity;
use crate::error::Result;
use crate::extractor::{HeuristicExtractor, MetadataExtractor};
use crate::types::{CodeMetadata, ExtractionLevel, MetadataRequest};
use orca_code_chunker::Language;
use orca_protocol::unix_ms_now;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const COMPREHENSIVE_THRESHOLD: f64 = 0.8;
const DEEP_THRESHOLD: f64 = 0.4;
const MAX_PATTERN_EXAMPLES: usize = 5;
const MAX_EXAMPLE_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    Quick,
    Deep,
    Comprehensive,
}

impl StrategyName {
    pub const ALL: [Self; 3] = [Self::Quick, Self::Deep, Self::Comprehensive];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Deep => "deep",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl std::fmt::Display for StrategyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extraction strategy and its usage record
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionStrategy {
    pub name: StrategyName,
    pub priority: u8,
    /// 1 = quick, 2 = deep, 3 = comprehensive
    pub depth: u8,
    pub times_used: u64,
    pub last_success_rate: f64,
    pub last_used_unix_ms: Option<u64>,
}

impl ExtractionStrategy {
    const fn new(name: StrategyName, priority: u8, depth: u8) -> Self {
        Self {
            name,
            priority,
            depth,
            times_used: 0,
            last_success_rate: 0.0,
            last_used_unix_ms: None,
        }
    }

    /// Request this strategy extracts with.
    ///
    /// Quick reads signatures only, deep adds dependencies, docstrings and
    /// call sites, comprehensive adds types, comments and the complexity
    /// score.
    pub fn request(&self) -> MetadataRequest {
        match self.depth {
            0 | 1 => MetadataRequest::new(ExtractionLevel::Minimal),
            2 => MetadataRequest::new(ExtractionLevel::Deep).include_types(false),
            _ => MetadataRequest::new(ExtractionLevel::Comprehensive).include_comments(true),
        }
    }
}

/// Structural pattern seen across extractions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnedPattern {
    pub frequency: u64,
    pub confidence: f64,
    pub last_seen_unix_ms: u64,
    pub examples: Vec<String>,
}

/// Picks an extraction depth from a complexity estimate and learns which
/// metadata sections recur.
pub struct AdaptiveMetadataManager {
    extractor: Arc<dyn MetadataExtractor>,
    strategies: BTreeMap<StrategyName, ExtractionStrategy>,
    patterns: BTreeMap<String, LearnedPattern>,
}

impl AdaptiveMetadataManager {
    pub fn new() -> Result<Self> {
        Ok(Self::with_extractor(Arc::new(HeuristicExtractor::new()?)))
    }

    pub fn with_extractor(extractor: Arc<dyn MetadataExtractor>) -> Self {
        let strategies = [
            ExtractionStrategy::new(StrategyName::Quick, 1, 1),
            ExtractionStrategy::new(StrategyName::Deep, 2, 2),
            ExtractionStrategy::new(StrategyName::Comprehensive, 3, 3),
        ]
        .into_iter()
        .map(|s| (s.name, s))
        .collect();
        Self {
            extractor,
            strategies,
            patterns: BTreeMap::new(),
        }
    }

    pub fn select_strategy(code: &str) -> StrategyName {
        let complexity = estimate_complexity(code);
        if complexity > COMPREHENSIVE_THRESHOLD {
            StrategyName::Comprehensive
        } else if complexity > DEEP_THRESHOLD {
            StrategyName::Deep
        } else {
            StrategyName::Quick
        }
    }

    /// Extract with the strategy the code's complexity calls for; the
    /// language comes from the path's extension.
    pub fn extract_metadata(&mut self, code: &str, path: &Path) -> Result<CodeMetadata> {
        let language = Language::from_path(path);
        let name = Self::select_strategy(code);
        let request = self.strategy(name).request();
        log::debug!("Extracting {} with {name} strategy", path.display());

        let outcome = self.extractor.extract(code, language, &request);
        let now = unix_ms_now();
        if let Some(strategy) = self.strategies.get_mut(&name) {
            strategy.times_used += 1;
            strategy.last_used_unix_ms = Some(now);
            strategy.last_success_rate = if outcome.is_ok() { 1.0 } else { 0.0 };
        }

        let metadata = outcome?;
        self.learn_patterns(&metadata, now);
        Ok(metadata)
    }

    pub fn extract_file(&mut self, path: &Path) -> Result<CodeMetadata> {
        let code = std::fs::read_to_string(path)?;
        self.extract_metadata(&code, path)
    }

    pub fn strategies(&self) -> impl Iterator<Item = &ExtractionStrategy> {
        self.strategies.values()
    }

    pub fn patterns(&self) -> &BTreeMap<String, LearnedPattern> {
        &self.patterns
    }

    fn strategy(&self, name: StrategyName) -> ExtractionStrategy {
        self.strategies
            .get(&name)
            .cloned()
            .unwrap_or_else(|| ExtractionStrategy::new(name, 1, 1))
    }

    /// Every non-empty list or map section becomes a `<section>_structure`
    /// pattern.
    fn learn_patterns(&mut self, metadata: &CodeMetadata, now: u64) {
        let Ok(serde_json::Value::Object(sections)) = serde_json::to_value(metadata) else {
            return;
        };
        for (section, value) in sections {
            let populated = match &value {
                serde_json::Value::Array(items) => !items.is_empty(),
                serde_json::Value::Object(map) => !map.is_empty(),
                _ => false,
            };
            if !populated {
                continue;
            }

            let example: String = value.to_string().chars().take(MAX_EXAMPLE_CHARS).collect();
            self.patterns
                .entry(format!("{section}_structure"))
                .and_modify(|pattern| {
                    pattern.frequency += 1;
                    pattern.last_seen_unix_ms = now;
                    if pattern.examples.len() < MAX_PATTERN_EXAMPLES {
                        pattern.examples.push(example.clone());
                    }
                })
                .or_insert_with(|| LearnedPattern {
                    frequency: 1,
                    confidence: 1.0,
                    last_seen_unix_ms: now,
                    examples: vec![example.clone()],
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetadataError;
    use pretty_assertions::assert_eq;

    const SMALL: &str = "import os\n\ndef main():\n    return os.getcwd()\n";

    fn complex_python() -> String {
        let mut code = String::new();
        for i in 0..50 {
            code.push_str(&format!("import mod{i}\n"));
        }
        for i in 0..50 {
            code.push_str(&format!("class Service{i}:\n"));
            for j in 0..2 {
                code.push_str(&format!("    async def handle{j}(self, req: dict) -> dict:\n"));
                code.push_str("        try:\n            return await process(req)\n");
                code.push_str("        except ValueError:\n            raise\n");
            }
        }
        code
    }

    #[test]
    fn small_code_uses_quick_strategy() {
        let mut manager = AdaptiveMetadataManager::new().unwrap();
        assert_eq!(AdaptiveMetadataManager::select_strategy(SMALL), StrategyName::Quick);

        let meta = manager.extract_metadata(SMALL, Path::new("main.py")).unwrap();
        assert_eq!(meta.imports, vec!["os"]);
        assert!(meta.calls.is_empty());
        assert!(meta.dependencies.is_empty());

        let quick = manager
            .strategies()
            .find(|s| s.name == StrategyName::Quick)
            .unwrap();
        assert_eq!(quick.times_used, 1);
        assert_eq!(quick.last_success_rate, 1.0);
        assert!(quick.last_used_unix_ms.is_some());
    }

    #[test]
    fn complex_code_uses_comprehensive_strategy() {
        let code = complex_python();
        assert_eq!(
            AdaptiveMetadataManager::select_strategy(&code),
            StrategyName::Comprehensive
        );

        let mut manager = AdaptiveMetadataManager::new().unwrap();
        let meta = manager.extract_metadata(&code, Path::new("svc.py")).unwrap();
        assert_eq!(meta.classes.len(), 50);
        assert_eq!(meta.functions.len(), 100);
        assert_eq!(meta.types["handle0.req"], "dict");
        assert_eq!(meta.calls, vec!["process"]);
        assert!(meta.complexity.unwrap() > 0.8);
    }

    #[test]
    fn strategy_requests_grow_with_depth() {
        let manager = AdaptiveMetadataManager::new().unwrap();
        let quick = manager.strategy(StrategyName::Quick).request();
        let deep = manager.strategy(StrategyName::Deep).request();
        let full = manager.strategy(StrategyName::Comprehensive).request();

        assert_eq!(quick.extraction_level, ExtractionLevel::Minimal);
        assert!(deep.wants_calls() && deep.wants_dependencies() && !deep.wants_types());
        assert!(full.wants_types() && full.include_comments && full.wants_complexity());
    }

    #[test]
    fn learns_structure_patterns() {
        let mut manager = AdaptiveMetadataManager::new().unwrap();
        for i in 0..7 {
            let code = format!("import os\nclass Widget{i}(Base):\n    pass\n");
            manager.extract_metadata(&code, Path::new("w.py")).unwrap();
        }

        let patterns = manager.patterns();
        let classes = &patterns["classes_structure"];
        assert_eq!(classes.frequency, 7);
        assert_eq!(classes.examples.len(), MAX_PATTERN_EXAMPLES);
        assert!(classes.examples.iter().all(|e| e.chars().count() <= MAX_EXAMPLE_CHARS));
        assert_eq!(patterns["imports_structure"].frequency, 7);
        // no function definitions, so no function pattern
        assert!(!patterns.contains_key("functions_structure"));
    }

    #[test]
    fn failures_are_recorded_on_the_strategy() {
        let mut manager = AdaptiveMetadataManager::new().unwrap();
        let err = manager
            .extract_metadata("package main", Path::new("main.go"))
            .unwrap_err();
        assert!(matches!(err, MetadataError::UnsupportedLanguage(_)));

        let quick = manager
            .strategies()
            .find(|s| s.name == StrategyName::Quick)
            .unwrap();
        assert_eq!(quick.times_used, 1);
        assert_eq!(quick.last_success_rate, 0.0);
        assert!(manager.patterns().is_empty());
    }

    #[test]
    fn extract_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.rs");
        std::fs::write(&path, "pub fn answer() -> u32 {\n    42\n}\n").unwrap();

        let mut manager = AdaptiveMetadataManager::new().unwrap();
        let meta = manager.extract_file(&path).unwrap();
        assert_eq!(meta.functions[0].name, "answer");

        let missing = manager.extract_file(&dir.path().join("missing.rs"));
        assert!(matches!(missing, Err(MetadataError::Io(_))));
    }
}
