use orca_metadata::CodeMetadata;
use orca_protocol::{Chunk, CodeContext};
use serde::Serialize;
use std::fmt::Write;

const MAX_RELATED_CHUNKS: usize = 5;

/// Everything an agent sees about the code under analysis
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisContext {
    pub code: CodeContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CodeMetadata>,
    /// Retrieved chunks related to the code
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<Chunk>,
}

impl AnalysisContext {
    pub fn new(code: CodeContext) -> Self {
        Self {
            code,
            metadata: None,
            related: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: CodeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn with_related(mut self, related: Vec<Chunk>) -> Self {
        self.related = related;
        self
    }

    /// Fold extracted imports and dependencies into the code context
    pub fn absorb_metadata(&mut self, metadata: CodeMetadata) {
        for import in &metadata.imports {
            if !self.code.imports.contains(import) {
                self.code.imports.push(import.clone());
            }
        }
        for module in metadata.dependencies.keys() {
            if !self.code.dependencies.contains(module) {
                self.code.dependencies.push(module.clone());
            }
        }
        self.metadata = Some(metadata);
    }

    /// User prompt shared by every agent
    pub fn render_prompt(&self, task: &str) -> String {
        let mut prompt = String::new();
        let _ = writeln!(prompt, "{task}");
        let location = self.code.file_path.as_deref().unwrap_or("<snippet>");
        match (self.code.start_line, self.code.end_line) {
            (Some(start), Some(end)) => {
                let _ = writeln!(prompt, "\nFile: {location} (lines {start}-{end})");
            }
            _ => {
                let _ = writeln!(prompt, "\nFile: {location}");
            }
        }
        let _ = writeln!(prompt, "Language: {}", self.code.language);
        let _ = writeln!(
            prompt,
            "```{}\n{}\n```",
            self.code.language, self.code.code_snippet
        );

        if !self.code.imports.is_empty() {
            let _ = writeln!(prompt, "\nImports: {}", self.code.imports.join(", "));
        }
        if let Some(metadata) = &self.metadata {
            if let Ok(json) = serde_json::to_string(metadata) {
                let _ = writeln!(prompt, "\nMetadata: {json}");
            }
        }
        for chunk in self.related.iter().take(MAX_RELATED_CHUNKS) {
            let _ = writeln!(
                prompt,
                "\nRelated: {}:{}-{}\n{}",
                chunk.file_path, chunk.start_line, chunk.end_line, chunk.content
            );
        }
        prompt.push_str("\nAnswer with a single JSON object.");
        prompt
    }
}
