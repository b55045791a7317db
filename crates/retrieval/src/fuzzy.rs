use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Matcher, Utf32String};
use orca_protocol::Chunk;

const PREVIEW_CHARS: usize = 200;

/// Fuzzy matching of a query against chunk paths, symbols and a content
/// preview. Used when the vector path is unavailable.
pub struct FuzzySearch {
    matcher: Matcher,
}

impl FuzzySearch {
    pub fn new() -> Self {
        Self {
            matcher: Matcher::new(nucleo_matcher::Config::DEFAULT),
        }
    }

    /// Returns (chunk_index, score) sorted by score descending, scores
    /// normalised so the best match is 1.0
    pub fn search(&mut self, query: &str, chunks: &[Chunk], limit: usize) -> Vec<(usize, f32)> {
        let pattern = Pattern::parse(query, CaseMatching::Smart, Normalization::Smart);

        let mut scored: Vec<(usize, u32)> = chunks
            .iter()
            .enumerate()
            .filter_map(|(idx, chunk)| {
                let path = Utf32String::from(chunk.file_path.as_str());
                let path_score = pattern.score(path.slice(..), &mut self.matcher);

                let symbol_score = chunk.symbol.as_ref().and_then(|name| {
                    let symbol = Utf32String::from(name.as_str());
                    pattern.score(symbol.slice(..), &mut self.matcher)
                });

                let preview: String = chunk.content.chars().take(PREVIEW_CHARS).collect();
                let content = Utf32String::from(preview.as_str());
                let content_score = pattern.score(content.slice(..), &mut self.matcher);

                let best = [path_score, symbol_score, content_score]
                    .into_iter()
                    .flatten()
                    .max()?;
                Some((idx, best))
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(limit);

        #[allow(clippy::cast_precision_loss)]
        let max_score = scored.first().map_or(1.0, |(_, s)| *s as f32);

        scored
            .into_iter()
            .map(|(idx, score)| {
                #[allow(clippy::cast_precision_loss)]
                let normalized = if max_score > 0.0 {
                    (score as f32 / max_score).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                (idx, normalized)
            })
            .collect()
    }
}

impl Default for FuzzySearch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, symbol: &str, content: &str) -> Chunk {
        Chunk::new(path.to_string(), 1, 10, content.to_string(), "rust".into())
            .chunk_type("function")
            .symbol(symbol)
    }

    #[test]
    fn matches_paths() {
        let mut fuzzy = FuzzySearch::new();
        let chunks = vec![
            chunk("src/api/handler.rs", "process", "fn process() {}"),
            chunk("src/main.rs", "main", "fn main() {}"),
            chunk("tests/api_test.rs", "test", "fn test() {}"),
        ];

        let results = fuzzy.search("api", &chunks, 5);
        assert!(results.iter().any(|(idx, _)| *idx == 0));
        assert!((results[0].1 - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn matches_symbols() {
        let mut fuzzy = FuzzySearch::new();
        let chunks = vec![
            chunk("a.rs", "get_user", "fn get_user() {}"),
            chunk("a.rs", "set_data", "fn set_data() {}"),
            chunk("a.rs", "fetch_item", "fn fetch_item() {}"),
        ];

        let results = fuzzy.search("get", &chunks, 5);
        assert_eq!(results[0].0, 0);
    }

    #[test]
    fn tolerates_partial_words() {
        let mut fuzzy = FuzzySearch::new();
        let chunks = vec![chunk("a.rs", "process_data", "fn process_data() {}")];
        assert!(!fuzzy.search("proces", &chunks, 5).is_empty());
    }

    #[test]
    fn respects_limit() {
        let mut fuzzy = FuzzySearch::new();
        let chunks: Vec<Chunk> = (0..10)
            .map(|i| chunk(&format!("src/handler_{i}.rs"), "handle", "fn handle() {}"))
            .collect();
        assert_eq!(fuzzy.search("handler", &chunks, 3).len(), 3);
    }
}
