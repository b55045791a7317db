use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;

pub const DEFAULT_DIMENSION: usize = 384;

/// Turns text into fixed-size vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Embed texts, preserving request order
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| VectorStoreError::EmbeddingError("empty embedding batch".to_string()))
    }
}

/// Deterministic offline embedder: feature-hashed identifier tokens with
/// sub-linear term weights, L2-normalised. Texts sharing vocabulary score
/// higher under cosine similarity; nothing is downloaded.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        let mut counts: std::collections::HashMap<String, u32> = std::collections::HashMap::new();
        for token in tokenize(text) {
            *counts.entry(token).or_insert(0) += 1;
        }

        for (token, count) in counts {
            let mut state = fnv1a_64(token.as_bytes());
            let bits = splitmix64(&mut state);
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (bits % self.dimension as u64) as usize;
            let sign = if bits >> 63 == 0 { 1.0 } else { -1.0 };
            #[allow(clippy::cast_precision_loss)]
            let weight = 1.0 + (count as f32).ln();
            vec[bucket] += sign * weight;
        }

        normalize(&mut vec);
        vec
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }
}

/// Lowercased identifier tokens; snake_case and camelCase parts are emitted
/// alongside the whole identifier.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        if word.is_empty() {
            continue;
        }
        let whole = word.to_lowercase();
        let mut parts = Vec::new();
        for piece in word.split('_').filter(|p| !p.is_empty()) {
            let mut current = String::new();
            let mut prev_lower = false;
            for ch in piece.chars() {
                if ch.is_uppercase() && prev_lower && !current.is_empty() {
                    parts.push(std::mem::take(&mut current).to_lowercase());
                }
                prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
                current.push(ch);
            }
            if !current.is_empty() {
                parts.push(current.to_lowercase());
            }
        }
        if parts.len() > 1 {
            tokens.extend(parts);
        }
        tokens.push(whole);
    }
    tokens
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
