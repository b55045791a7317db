use serde::{Deserialize, Serialize};

/// Named chunk granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Small,
    Medium,
    Large,
}

impl Granularity {
    pub const ALL: [Self; 3] = [Self::Small, Self::Medium, Self::Large];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

/// Parameters controlling how a file is cut into chunks. Presets are
/// immutable templates; callers select one, they do not tune it per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingStrategy {
    pub granularity: Granularity,

    /// Chunks below this size are merged with their neighbour when
    /// `combine_small` is set (tokens)
    pub min_chunk_tokens: usize,

    /// Segments above this size are split by lines (tokens)
    pub max_chunk_tokens: usize,

    /// Tokens repeated at the start of the next window when a segment is split
    pub overlap_tokens: usize,

    /// Line prefixes that start a new segment. `"\n\n"` means blank lines split too.
    pub split_on: Vec<String>,

    /// Merge adjacent small segments
    pub combine_small: bool,
}

impl ChunkingStrategy {
    pub fn small() -> Self {
        Self {
            granularity: Granularity::Small,
            min_chunk_tokens: 50,
            max_chunk_tokens: 200,
            overlap_tokens: 10,
            split_on: markers(&["class ", "def ", "\n\n"]),
            combine_small: true,
        }
    }

    pub fn medium() -> Self {
        Self {
            granularity: Granularity::Medium,
            min_chunk_tokens: 150,
            max_chunk_tokens: 500,
            overlap_tokens: 20,
            split_on: markers(&["class ", "def ", "\n\n", "async "]),
            combine_small: true,
        }
    }

    pub fn large() -> Self {
        Self {
            granularity: Granularity::Large,
            min_chunk_tokens: 400,
            max_chunk_tokens: 1000,
            overlap_tokens: 50,
            split_on: markers(&["class ", "def ", "\n\n", "async ", "if __name__"]),
            combine_small: false,
        }
    }

    pub fn preset(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Small => Self::small(),
            Granularity::Medium => Self::medium(),
            Granularity::Large => Self::large(),
        }
    }

    pub fn splits_on_blank_lines(&self) -> bool {
        self.split_on.iter().any(|m| m == "\n\n")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chunk_tokens == 0 {
            return Err("max_chunk_tokens must be > 0".to_string());
        }

        if self.min_chunk_tokens > self.max_chunk_tokens {
            return Err(format!(
                "min_chunk_tokens ({}) cannot exceed max_chunk_tokens ({})",
                self.min_chunk_tokens, self.max_chunk_tokens
            ));
        }

        if self.overlap_tokens >= self.max_chunk_tokens {
            return Err(format!(
                "overlap_tokens ({}) must be smaller than max_chunk_tokens ({})",
                self.overlap_tokens, self.max_chunk_tokens
            ));
        }

        Ok(())
    }
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        Self::small()
    }
}

fn markers(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|m| (*m).to_string()).collect()
}
