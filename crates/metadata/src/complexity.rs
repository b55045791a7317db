//! Six-factor structural complexity score in `[0, 1]`.
//!
//! Each factor is a raw count divided by its saturation point and capped at
//! 1; the score is their mean.

const MAX_LINES: f64 = 1000.0;
const MAX_CLASSES: f64 = 50.0;
const MAX_FUNCTIONS: f64 = 100.0;
const MAX_IMPORTS: f64 = 50.0;
const MAX_ERROR_HANDLING: f64 = 20.0;
const MAX_ASYNC: f64 = 20.0;

const CLASS_PREFIXES: &[&str] = &["class ", "struct ", "trait ", "interface ", "enum "];
const FUNCTION_PREFIXES: &[&str] = &["def ", "fn ", "function ", "async def ", "async fn "];
const IMPORT_PREFIXES: &[&str] = &["import ", "from ", "use ", "require("];
const ERROR_MARKERS: &[&str] = &["try:", "try {", "except", "catch", "Result<"];

/// Raw counts behind the score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplexityFactors {
    pub lines: usize,
    pub classes: usize,
    pub functions: usize,
    pub imports: usize,
    pub error_handling: usize,
    pub async_markers: usize,
}

impl ComplexityFactors {
    pub fn measure(source: &str) -> Self {
        let mut factors = Self::default();
        for line in source.lines() {
            factors.lines += 1;
            let trimmed = strip_visibility(line.trim_start());
            if starts_with_any(trimmed, CLASS_PREFIXES) {
                factors.classes += 1;
            }
            if starts_with_any(trimmed, FUNCTION_PREFIXES) {
                factors.functions += 1;
            }
            if starts_with_any(trimmed, IMPORT_PREFIXES) {
                factors.imports += 1;
            }
            factors.error_handling += ERROR_MARKERS
                .iter()
                .map(|marker| line.matches(marker).count())
                .sum::<usize>();
            factors.async_markers += line.matches("async ").count();
        }
        factors
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self) -> f64 {
        let normalized = [
            self.lines as f64 / MAX_LINES,
            self.classes as f64 / MAX_CLASSES,
            self.functions as f64 / MAX_FUNCTIONS,
            self.imports as f64 / MAX_IMPORTS,
            self.error_handling as f64 / MAX_ERROR_HANDLING,
            self.async_markers as f64 / MAX_ASYNC,
        ];
        normalized.iter().map(|v| v.min(1.0)).sum::<f64>() / normalized.len() as f64
    }
}

pub fn estimate_complexity(source: &str) -> f64 {
    ComplexityFactors::measure(source).score()
}

fn starts_with_any(line: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| line.starts_with(p))
}

fn strip_visibility(line: &str) -> &str {
    ["pub(crate) ", "pub ", "export default ", "export "]
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
        .unwrap_or(line)
}
