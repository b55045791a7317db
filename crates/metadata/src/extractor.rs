//! Line-oriented regex extraction for Python, Rust, JavaScript and TypeScript.
//!
//! No grammar is involved: definitions are recognised from their first line,
//! so multi-line signatures yield the name but only the parameters that sit
//! on that line.

use crate::complexity::estimate_complexity;
use crate::error::{MetadataError, Result};
use crate::types::{ClassInfo, CodeMetadata, FunctionInfo, MetadataRequest};
use orca_code_chunker::Language;
use regex::{Captures, Regex};
use std::collections::BTreeSet;

const CALL_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "match", "return", "switch", "catch", "except", "with",
    "and", "or", "not", "in", "fn", "def", "function", "await", "yield", "typeof", "sizeof",
    "assert", "print", "super", "Some", "Ok", "Err", "loop", "async", "lambda",
];

/// Turns source text into [`CodeMetadata`]
pub trait MetadataExtractor: Send + Sync {
    fn extract(
        &self,
        source: &str,
        language: Language,
        request: &MetadataRequest,
    ) -> Result<CodeMetadata>;

    fn supports(&self, language: Language) -> bool;
}

struct LanguagePatterns {
    imports: Vec<Regex>,
    functions: Vec<Regex>,
    class: Regex,
    type_alias: Option<Regex>,
    comment: Regex,
    doc_comment: Option<Regex>,
    /// Python style: the docstring follows the definition line
    trailing_docstrings: bool,
}

impl LanguagePatterns {
    fn python() -> Result<Self> {
        Ok(Self {
            imports: vec![
                Regex::new(r"^\s*from\s+(?P<module>[\w.]+)\s+import\s+\(?(?P<names>[\w*,\s]+)\)?")?,
                Regex::new(r"^\s*import\s+(?P<module>[\w.]+(?:\s+as\s+\w+)?(?:\s*,\s*[\w.]+(?:\s+as\s+\w+)?)*)")?,
            ],
            functions: vec![Regex::new(
                r"^\s*(?P<async>async\s+)?def\s+(?P<name>\w+)\s*\((?P<params>[^)]*)\)?(?:\s*->\s*(?P<returns>[^:]+))?",
            )?],
            class: Regex::new(r"^\s*class\s+(?P<name>\w+)(?:\((?P<bases>[^)]*)\))?")?,
            type_alias: Some(Regex::new(
                r"^(?P<name>[A-Z]\w*)\s*(?::\s*TypeAlias\s*)?=\s*(?P<ty>(?:Union|Optional|Callable|Dict|List|Tuple|Literal)\[.+)$",
            )?),
            comment: Regex::new(r"^\s*#\s?(?P<text>.*)$")?,
            doc_comment: None,
            trailing_docstrings: true,
        })
    }

    fn rust() -> Result<Self> {
        Ok(Self {
            imports: vec![
                Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+(?P<path>[^;]+);")?,
                Regex::new(r"^\s*extern\s+crate\s+(?P<module>\w+)")?,
            ],
            functions: vec![Regex::new(
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?P<async>async\s+)?(?:unsafe\s+)?(?:extern\s+\S+\s+)?fn\s+(?P<name>\w+)[^(]*\((?P<params>[^)]*)\)?(?:\s*->\s*(?P<returns>[^{;]+))?",
            )?],
            class: Regex::new(
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?(?:struct|enum|trait|union)\s+(?P<name>\w+)(?:<[^>]*>)?(?:\s*:\s*(?P<bases>[^{;]+))?",
            )?,
            type_alias: Some(Regex::new(
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?type\s+(?P<name>\w+)(?:<[^=]*>)?\s*=\s*(?P<ty>[^;]+);",
            )?),
            comment: Regex::new(r"^\s*//[/!]?\s?(?P<text>.*)$")?,
            doc_comment: Some(Regex::new(r"^\s*///\s?(?P<text>.*)$")?),
            trailing_docstrings: false,
        })
    }

    fn javascript() -> Result<Self> {
        Ok(Self {
            imports: vec![
                Regex::new(r#"^\s*import\s+(?:(?P<names>.+?)\s+from\s+)?['"](?P<module>[^'"]+)['"]"#)?,
                Regex::new(
                    r#"^\s*(?:const|let|var)\s+(?P<names>[\w${}\s,:]+?)\s*=\s*require\(\s*['"](?P<module>[^'"]+)['"]\s*\)"#,
                )?,
            ],
            functions: vec![
                Regex::new(
                    r"^\s*(?:export\s+)?(?:default\s+)?(?P<async>async\s+)?function\s*\*?\s*(?P<name>[\w$]+)\s*(?:<[^(]*>)?\((?P<params>[^)]*)\)?(?:\s*:\s*(?P<returns>[^{]+))?",
                )?,
                Regex::new(
                    r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>[\w$]+)\s*(?::[^=]+)?=\s*(?P<async>async\s+)?(?:\((?P<params>[^)]*)\)|(?P<single>[\w$]+))(?:\s*:\s*(?P<returns>[^=]+?))?\s*=>",
                )?,
                Regex::new(
                    r"^\s*(?:(?:public|private|protected|static|readonly|override)\s+)*(?P<async>async\s+)?(?P<name>[A-Za-z_$][\w$]*)\s*\((?P<params>[^)]*)\)\s*(?::\s*(?P<returns>[^{]+?))?\s*\{\s*$",
                )?,
            ],
            class: Regex::new(
                r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:class|interface)\s+(?P<name>[\w$]+)(?:<[^>]*>)?(?:\s+extends\s+(?P<bases>[\w$.,\s<>]+?))?(?:\s+implements\s+[\w$.,\s<>]+?)?\s*\{?\s*$",
            )?,
            type_alias: Some(Regex::new(
                r"^\s*(?:export\s+)?type\s+(?P<name>\w+)(?:<[^=]*>)?\s*=\s*(?P<ty>[^;]+);?\s*$",
            )?),
            comment: Regex::new(r"^\s*(?://+|/\*+|\*+/?)\s?(?P<text>.*?)\s*(?:\*/)?\s*$")?,
            doc_comment: Some(Regex::new(r"^\s*(?:/\*\*+|\*+/?)\s?(?P<text>.*?)\s*(?:\*/)?\s*$")?),
            trailing_docstrings: false,
        })
    }
}

/// Regex-driven [`MetadataExtractor`]. Patterns are compiled once in
/// [`HeuristicExtractor::new`].
pub struct HeuristicExtractor {
    python: LanguagePatterns,
    rust: LanguagePatterns,
    javascript: LanguagePatterns,
    call: Regex,
}

impl HeuristicExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            python: LanguagePatterns::python()?,
            rust: LanguagePatterns::rust()?,
            javascript: LanguagePatterns::javascript()?,
            call: Regex::new(r"(?P<name>[A-Za-z_$][\w$]*(?:(?:\.|::)[A-Za-z_$][\w$]*)*)\s*\(")?,
        })
    }

    fn patterns(&self, language: Language) -> Option<&LanguagePatterns> {
        match language {
            Language::Python => Some(&self.python),
            Language::Rust => Some(&self.rust),
            Language::JavaScript | Language::TypeScript => Some(&self.javascript),
            _ => None,
        }
    }
}

impl MetadataExtractor for HeuristicExtractor {
    fn extract(
        &self,
        source: &str,
        language: Language,
        request: &MetadataRequest,
    ) -> Result<CodeMetadata> {
        let patterns = self
            .patterns(language)
            .ok_or_else(|| MetadataError::UnsupportedLanguage(language.as_str().to_string()))?;
        if source.trim().is_empty() {
            return Err(MetadataError::EmptySource);
        }

        let mut pass = Pass::new(language, request);
        for (idx, line) in source.lines().enumerate() {
            pass.line(patterns, &self.call, idx + 1, line);
        }
        let mut metadata = pass.finish();

        if request.wants_complexity() {
            metadata.complexity = Some(estimate_complexity(source));
        }
        log::debug!(
            "Extracted {} functions, {} classes, {} imports ({} level, {})",
            metadata.functions.len(),
            metadata.classes.len(),
            metadata.imports.len(),
            request.extraction_level.as_str(),
            language.as_str()
        );
        Ok(metadata)
    }

    fn supports(&self, language: Language) -> bool {
        self.patterns(language).is_some()
    }
}

/// Mutable state of one extraction pass
struct Pass<'r> {
    language: Language,
    request: &'r MetadataRequest,
    metadata: CodeMetadata,
    calls: BTreeSet<String>,
    call_order: Vec<String>,
    pending_doc: Option<String>,
    awaiting_docstring: Option<String>,
}

impl<'r> Pass<'r> {
    fn new(language: Language, request: &'r MetadataRequest) -> Self {
        Self {
            language,
            request,
            metadata: CodeMetadata::default(),
            calls: BTreeSet::new(),
            call_order: Vec::new(),
            pending_doc: None,
            awaiting_docstring: None,
        }
    }

    fn line(&mut self, patterns: &LanguagePatterns, call: &Regex, line_no: usize, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        if let Some(owner) = self.awaiting_docstring.take() {
            if let Some(doc) = python_docstring(trimmed) {
                self.add_docstring(owner, doc);
                return;
            }
        }

        if let Some(caps) = patterns.comment.captures(line) {
            if let Some(doc) = patterns.doc_comment.as_ref().and_then(|re| re.captures(line)) {
                let text = group(&doc, "text").unwrap_or_default();
                if self.pending_doc.is_none() && !text.is_empty() {
                    self.pending_doc = Some(text.to_string());
                }
            }
            if self.request.include_comments {
                if let Some(text) = group(&caps, "text").filter(|t| !t.is_empty()) {
                    self.metadata.comments.push(text.to_string());
                }
            }
            return;
        }

        // attributes and decorators sit between docs and definitions
        if trimmed.starts_with("#[") || trimmed.starts_with('@') {
            return;
        }

        let doc = self.pending_doc.take();

        if self.import(patterns, line) {
            return;
        }
        if let Some(name) = self.class(patterns, line, line_no) {
            self.attach_doc(patterns, name, doc);
            return;
        }
        if let Some(name) = self.function(patterns, line, line_no) {
            self.attach_doc(patterns, name, doc);
            return;
        }
        if self.type_alias(patterns, line) {
            return;
        }
        if self.request.wants_calls() {
            self.calls_in(call, line);
        }
    }

    fn import(&mut self, patterns: &LanguagePatterns, line: &str) -> bool {
        let Some(caps) = patterns.imports.iter().find_map(|re| re.captures(line)) else {
            return false;
        };
        let entries = match (group(&caps, "path"), group(&caps, "module")) {
            (Some(path), _) => vec![split_rust_use(path)],
            (None, Some(module)) => match group(&caps, "names") {
                Some(names) => vec![(module.to_string(), split_names(names))],
                // `import a, b as c`
                None => module
                    .split(',')
                    .filter_map(|m| m.split_whitespace().next())
                    .map(|m| (m.to_string(), Vec::new()))
                    .collect(),
            },
            (None, None) => return false,
        };

        for (module, names) in entries {
            if !self.metadata.imports.contains(&module) {
                self.metadata.imports.push(module.clone());
            }
            if self.request.wants_dependencies() {
                let key = truncate_module(&module, self.request.max_dependency_depth);
                let slot = self.metadata.dependencies.entry(key).or_default();
                for name in names {
                    if !slot.contains(&name) {
                        slot.push(name);
                    }
                }
            }
        }
        true
    }

    fn class(&mut self, patterns: &LanguagePatterns, line: &str, line_no: usize) -> Option<String> {
        let caps = patterns.class.captures(line)?;
        let name = group(&caps, "name")?.to_string();
        let bases = group(&caps, "bases")
            .map(|b| {
                b.split([',', '+'])
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty() && !s.contains('='))
                    .collect()
            })
            .unwrap_or_default();
        self.metadata.classes.push(ClassInfo {
            name: name.clone(),
            bases,
            line: line_no,
        });
        Some(name)
    }

    fn function(
        &mut self,
        patterns: &LanguagePatterns,
        line: &str,
        line_no: usize,
    ) -> Option<String> {
        let caps = patterns.functions.iter().find_map(|re| re.captures(line))?;
        let name = group(&caps, "name")?.to_string();
        if CALL_KEYWORDS.contains(&name.as_str()) {
            return None;
        }

        let raw_params = group(&caps, "params").or_else(|| group(&caps, "single")).unwrap_or_default();
        let params: Vec<(String, Option<String>)> = split_top_level(raw_params)
            .into_iter()
            .filter_map(|p| parse_param(&p))
            .collect();
        let returns = group(&caps, "returns")
            .map(|r| r.trim().trim_end_matches(['{', ':']).trim().to_string())
            .filter(|r| !r.is_empty());

        if self.request.wants_types() {
            for (param, ty) in &params {
                if let Some(ty) = ty {
                    self.metadata
                        .types
                        .insert(format!("{name}.{param}"), ty.clone());
                }
            }
            if let Some(returns) = &returns {
                self.metadata
                    .types
                    .insert(format!("{name}.return"), returns.clone());
            }
        }

        self.metadata.functions.push(FunctionInfo {
            name: name.clone(),
            params: params.into_iter().map(|(p, _)| p).collect(),
            returns,
            is_async: group(&caps, "async").is_some(),
            line: line_no,
        });
        Some(name)
    }

    fn type_alias(&mut self, patterns: &LanguagePatterns, line: &str) -> bool {
        let Some(caps) = patterns.type_alias.as_ref().and_then(|re| re.captures(line)) else {
            return false;
        };
        if self.request.wants_types() {
            if let (Some(name), Some(ty)) = (group(&caps, "name"), group(&caps, "ty")) {
                self.metadata
                    .types
                    .insert(name.to_string(), ty.trim().to_string());
            }
        }
        true
    }

    fn calls_in(&mut self, call: &Regex, line: &str) {
        for caps in call.captures_iter(line) {
            let Some(name) = group(&caps, "name") else {
                continue;
            };
            let leaf = name.rsplit(['.', ':']).next().unwrap_or(name);
            if CALL_KEYWORDS.contains(&name) || CALL_KEYWORDS.contains(&leaf) {
                continue;
            }
            if self.calls.insert(name.to_string()) {
                self.call_order.push(name.to_string());
            }
        }
    }

    fn attach_doc(&mut self, patterns: &LanguagePatterns, name: String, doc: Option<String>) {
        if patterns.trailing_docstrings {
            self.awaiting_docstring = Some(name);
        } else if let Some(doc) = doc {
            self.add_docstring(name, doc);
        }
    }

    fn add_docstring(&mut self, owner: String, doc: String) {
        if self.request.wants_docstrings() && !doc.is_empty() {
            self.metadata.docstrings.entry(owner).or_insert(doc);
        }
    }

    fn finish(mut self) -> CodeMetadata {
        if self.request.wants_calls() {
            let defined: BTreeSet<&str> = self.metadata.function_names().collect();
            log::trace!(
                "{} call sites in {} source, {} to local definitions",
                self.call_order.len(),
                self.language.as_str(),
                self.call_order.iter().filter(|c| defined.contains(c.as_str())).count()
            );
            self.metadata.calls = self.call_order;
        }
        self.metadata
    }
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> Option<&'t str> {
    caps.name(name).map(|m| m.as_str())
}

fn python_docstring(trimmed: &str) -> Option<String> {
    let body = trimmed
        .strip_prefix("\"\"\"")
        .or_else(|| trimmed.strip_prefix("'''"))?;
    let body = body
        .trim_end_matches("\"\"\"")
        .trim_end_matches("'''")
        .trim();
    Some(body.to_string())
}

/// `a::b::{C, D}` -> (`a::b`, [C, D]); `a::b::C` -> (`a::b`, [C])
fn split_rust_use(path: &str) -> (String, Vec<String>) {
    let path = path.trim();
    if let Some((module, rest)) = path.split_once("::{") {
        let inner = rest.strip_suffix('}').unwrap_or(rest);
        return (module.to_string(), split_names(inner));
    }
    match path.rsplit_once("::") {
        Some((module, leaf)) => (module.to_string(), vec![leaf.trim().to_string()]),
        None => (path.to_string(), Vec::new()),
    }
}

/// Imported names from a list such as `{ a, b as c }` or `* as fs`
fn split_names(names: &str) -> Vec<String> {
    split_top_level(names.trim().trim_start_matches('(').trim_end_matches(')'))
        .into_iter()
        .flat_map(|part| {
            // `React, { useState }`
            part.replace(['{', '}'], ",")
                .split(',')
                .map(|s| s.trim().trim_start_matches("type ").trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Split on commas outside of brackets
fn split_top_level(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in list.chars() {
        match ch {
            '(' | '[' | '<' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '>' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// `name: Type = default` -> (name, Some(Type))
fn parse_param(param: &str) -> Option<(String, Option<String>)> {
    let without_default = split_default(param);
    let (name, ty) = match without_default.split_once(':') {
        Some((name, ty)) => (name, Some(ty.trim().to_string())),
        None => (without_default, None),
    };
    let name = name
        .trim()
        .trim_start_matches(['*', '&', '.'])
        .trim_start_matches("mut ")
        .trim_end_matches('?')
        .trim();
    if name.is_empty() || name == "/" {
        return None;
    }
    Some((name.to_string(), ty.filter(|t| !t.is_empty())))
}

fn split_default(param: &str) -> &str {
    let mut depth = 0usize;
    for (idx, ch) in param.char_indices() {
        match ch {
            '(' | '[' | '<' | '{' => depth += 1,
            ')' | ']' | '>' | '}' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => return &param[..idx],
            _ => {}
        }
    }
    param
}

fn truncate_module(module: &str, depth: Option<usize>) -> String {
    let Some(depth) = depth.filter(|d| *d > 0) else {
        return module.to_string();
    };
    let separator = if module.contains("::") {
        "::"
    } else if module.contains('/') {
        "/"
    } else {
        "."
    };
    module
        .split(separator)
        .take(depth)
        .collect::<Vec<_>>()
        .join(separator)
}
