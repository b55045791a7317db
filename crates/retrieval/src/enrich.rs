use crate::error::Result;
use async_trait::async_trait;
use orca_protocol::{Chunk, CodeContext};
use std::collections::BTreeSet;

/// Fills the optional context of a result from its chunks. Failures are
/// absorbed by the caller; the result is returned without context.
#[async_trait]
pub trait ContextEnricher: Send + Sync {
    async fn enrich(&self, chunks: &[Chunk]) -> Result<CodeContext>;
}

/// Offline enricher: reads imports, definitions and leading comments
/// straight out of the chunk text.
#[derive(Debug, Clone, Default)]
pub struct HeuristicEnricher;

#[async_trait]
impl ContextEnricher for HeuristicEnricher {
    async fn enrich(&self, chunks: &[Chunk]) -> Result<CodeContext> {
        let Some(first) = chunks.first() else {
            return Ok(CodeContext::default());
        };

        let mut imports = BTreeSet::new();
        let mut symbols = BTreeSet::new();
        let mut files = BTreeSet::new();
        let mut docs = Vec::new();

        for chunk in chunks {
            files.insert(chunk.file_path.clone());
            if let Some(symbol) = &chunk.symbol {
                symbols.insert(symbol.clone());
            }
            for line in chunk.content.lines() {
                let trimmed = line.trim();
                if is_import(trimmed) {
                    imports.insert(trimmed.trim_end_matches(';').to_string());
                }
            }
            if let Some(doc) = leading_comment(&chunk.content) {
                docs.push(doc);
            }
        }

        let mut context = CodeContext::new(first.content.clone(), first.language.clone())
            .file_path(first.file_path.clone());
        context.start_line = Some(first.start_line);
        context.end_line = Some(first.end_line);
        context.dependencies = imports.iter().cloned().collect();
        context.imports = imports.into_iter().collect();
        context.callers = symbols.into_iter().collect();
        context.related_files = files
            .into_iter()
            .filter(|f| *f != first.file_path)
            .collect();
        if !docs.is_empty() {
            context.documentation = Some(docs.join("\n"));
        }
        Ok(context)
    }
}

fn is_import(line: &str) -> bool {
    ["import ", "from ", "use ", "require(", "#include "]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

fn leading_comment(content: &str) -> Option<String> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .skip_while(|l| l.is_empty())
        .take_while(|l| l.starts_with('#') || l.starts_with("//") || l.starts_with("\"\"\""))
        .map(|l| l.trim_start_matches(['#', '/', '"']).trim())
        .filter(|l| !l.is_empty())
        .collect();
    (!lines.is_empty()).then(|| lines.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn collects_imports_symbols_and_files() {
        let chunks = vec![
            Chunk::new(
                "svc/auth.py".into(),
                1,
                4,
                "# Token checks\nimport hmac\nfrom base64 import b64decode\ndef check(token): pass"
                    .into(),
                "python".into(),
            )
            .symbol("check"),
            Chunk::new(
                "svc/session.py".into(),
                1,
                2,
                "import hmac\ndef open_session(): pass".into(),
                "python".into(),
            )
            .symbol("open_session"),
        ];

        let context = HeuristicEnricher.enrich(&chunks).await.unwrap();
        assert_eq!(context.file_path.as_deref(), Some("svc/auth.py"));
        assert_eq!(
            context.imports,
            vec!["from base64 import b64decode", "import hmac"]
        );
        assert_eq!(context.callers, vec!["check", "open_session"]);
        assert_eq!(context.related_files, vec!["svc/session.py"]);
        assert_eq!(context.documentation.as_deref(), Some("Token checks"));
    }

    #[tokio::test]
    async fn no_chunks_no_context() {
        let context = HeuristicEnricher.enrich(&[]).await.unwrap();
        assert!(context.imports.is_empty());
    }
}
