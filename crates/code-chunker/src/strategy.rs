use crate::config::ChunkingStrategy;
use crate::language::Language;
use orca_protocol::Chunk;
use std::ops::Range;

/// Execute chunking strategy on source code
pub struct StrategyExecutor {
    strategy: ChunkingStrategy,
}

impl StrategyExecutor {
    pub const fn new(strategy: ChunkingStrategy) -> Self {
        Self { strategy }
    }

    /// Cut `content` into chunks: split at markers, merge small neighbours,
    /// then split oversized segments by lines with overlap.
    ///
    /// A single line longer than `max_chunk_tokens` is emitted whole.
    pub fn execute(&self, content: &str, file_path: &str, language: Language) -> Vec<Chunk> {
        let lines: Vec<&str> = content.lines().collect();
        let markers = self.markers(language);

        let segments: Vec<Range<usize>> = self
            .segment(&lines, &markers)
            .into_iter()
            .filter_map(|seg| trim_blank(&lines, seg))
            .collect();

        let segments = if self.strategy.combine_small {
            self.combine_small(&lines, segments)
        } else {
            segments
        };

        let mut chunks = Vec::new();
        for segment in segments {
            if span_tokens(&lines, &segment) > self.strategy.max_chunk_tokens {
                for window in self.split_oversized(&lines, segment) {
                    chunks.push(build_chunk(&lines, window, file_path, language, &markers));
                }
            } else {
                chunks.push(build_chunk(&lines, segment, file_path, language, &markers));
            }
        }

        log::debug!(
            "Chunked {file_path} into {} chunks ({} strategy)",
            chunks.len(),
            self.strategy.granularity.as_str()
        );
        chunks
    }

    fn markers(&self, language: Language) -> Vec<String> {
        let mut markers: Vec<String> = self
            .strategy
            .split_on
            .iter()
            .filter(|m| m.as_str() != "\n\n")
            .cloned()
            .collect();
        for marker in language.definition_markers() {
            if !markers.iter().any(|m| m == marker) {
                markers.push(marker.to_string());
            }
        }
        markers
    }

    fn segment(&self, lines: &[&str], markers: &[String]) -> Vec<Range<usize>> {
        let blank_split = self.strategy.splits_on_blank_lines();
        let mut segments = Vec::new();
        let mut start = 0;
        let mut prev_blank = false;

        for (idx, line) in lines.iter().enumerate() {
            let trimmed = line.trim_start();
            let blank = trimmed.is_empty();
            let boundary = idx > start
                && !blank
                && ((blank_split && prev_blank)
                    || markers.iter().any(|m| trimmed.starts_with(m.as_str())));
            if boundary {
                segments.push(start..idx);
                start = idx;
            }
            prev_blank = blank;
        }

        if start < lines.len() {
            segments.push(start..lines.len());
        }
        segments
    }

    fn combine_small(&self, lines: &[&str], segments: Vec<Range<usize>>) -> Vec<Range<usize>> {
        let mut combined: Vec<Range<usize>> = Vec::new();
        let mut current: Option<Range<usize>> = None;

        for segment in segments {
            current = match current {
                None => Some(segment),
                Some(cur) => {
                    let merged = cur.start..segment.end;
                    if span_tokens(lines, &cur) < self.strategy.min_chunk_tokens
                        && span_tokens(lines, &merged) <= self.strategy.max_chunk_tokens
                    {
                        Some(merged)
                    } else {
                        combined.push(cur);
                        Some(segment)
                    }
                }
            };
        }

        if let Some(cur) = current {
            combined.push(cur);
        }
        combined
    }

    fn split_oversized(&self, lines: &[&str], segment: Range<usize>) -> Vec<Range<usize>> {
        let max_bytes = self.strategy.max_chunk_tokens.saturating_mul(4);
        let overlap_bytes = self.strategy.overlap_tokens.saturating_mul(4);
        let mut windows = Vec::new();
        let mut start = segment.start;

        while start < segment.end {
            let mut end = start;
            let mut bytes = 0usize;
            while end < segment.end {
                let next = lines[end].len() + usize::from(end > start);
                if end > start && bytes + next >= max_bytes + 4 {
                    break;
                }
                bytes += next;
                end += 1;
            }
            windows.push(start..end);
            if end >= segment.end {
                break;
            }

            // Back off into the emitted window to carry some overlap forward.
            let mut next_start = end;
            let mut carried = 0usize;
            while next_start > start + 1 {
                let line = lines[next_start - 1].len() + 1;
                if carried + line > overlap_bytes {
                    break;
                }
                carried += line;
                next_start -= 1;
            }
            start = next_start;
        }

        windows
    }
}

fn trim_blank(lines: &[&str], segment: Range<usize>) -> Option<Range<usize>> {
    let mut start = segment.start;
    let mut end = segment.end;
    while start < end && lines[start].trim().is_empty() {
        start += 1;
    }
    while end > start && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    (start < end).then_some(start..end)
}

fn span_tokens(lines: &[&str], span: &Range<usize>) -> usize {
    let bytes: usize = lines[span.clone()].iter().map(|l| l.len()).sum::<usize>()
        + span.len().saturating_sub(1);
    bytes / 4
}

fn build_chunk(
    lines: &[&str],
    span: Range<usize>,
    file_path: &str,
    language: Language,
    markers: &[String],
) -> Chunk {
    let content = lines[span.clone()].join("\n");
    let mut chunk = Chunk::new(
        file_path.to_string(),
        span.start + 1,
        span.end,
        content,
        language.as_str().to_string(),
    );

    let head = lines[span.start].trim_start();
    let (kind, symbol) = classify_head(head, markers);
    chunk = chunk.chunk_type(kind);
    if let Some(symbol) = symbol {
        chunk = chunk.symbol(symbol);
    }
    chunk
}

fn classify_head(head: &str, markers: &[String]) -> (&'static str, Option<String>) {
    if !markers.iter().any(|m| head.starts_with(m.as_str())) {
        return ("block", None);
    }

    let mut words = head.split_whitespace();
    while let Some(word) = words.next() {
        let kind = match word {
            "def" | "fn" | "function" | "func" | "fun" => "function",
            "class" | "struct" | "enum" | "interface" | "trait" | "type" | "extension" => "class",
            "mod" | "module" => "module",
            w if w == "impl" || w.starts_with("impl<") => "impl",
            _ => continue,
        };
        let symbol = words.next().map(identifier_prefix).filter(|s| !s.is_empty());
        return (kind, symbol);
    }
    ("block", None)
}

fn identifier_prefix(word: &str) -> String {
    word.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}
