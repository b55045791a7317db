use orca_vector_store::{cosine_similarity, magnitude};
use serde::{Deserialize, Serialize};

/// Shape of one batch of stored embeddings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingStats {
    pub dimension: usize,
    pub avg_magnitude: f64,
    /// Mean pairwise cosine similarity; 1.0 for a single vector
    pub avg_similarity: f64,
    pub timestamp_unix_ms: u64,
}

impl EmbeddingStats {
    /// `None` for an empty batch
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(vectors: &[Vec<f32>], timestamp_unix_ms: u64) -> Option<Self> {
        let dimension = vectors.first()?.len();
        let avg_magnitude = vectors
            .iter()
            .map(|v| f64::from(magnitude(v)))
            .sum::<f64>()
            / vectors.len() as f64;

        Some(Self {
            dimension,
            avg_magnitude,
            avg_similarity: mean_pairwise_similarity(vectors),
            timestamp_unix_ms,
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_pairwise_similarity(vectors: &[Vec<f32>]) -> f64 {
    if vectors.len() < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in vectors.iter().enumerate() {
        for b in &vectors[i + 1..] {
            total += f64::from(cosine_similarity(a, b));
            pairs += 1;
        }
    }
    total / pairs as f64
}
