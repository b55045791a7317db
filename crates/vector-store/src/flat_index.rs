use crate::embeddings::cosine_similarity;
use crate::error::{Result, VectorStoreError};

/// Exact brute-force cosine index. Ids are dense positions assigned by the caller.
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Append a vector and return its id
    pub fn push(&mut self, vector: Vec<f32>) -> Result<usize> {
        self.check_dimension(&vector)?;
        self.vectors.push(vector);
        Ok(self.vectors.len() - 1)
    }

    /// Replace the vector stored under `id`
    pub fn replace(&mut self, id: usize, vector: Vec<f32>) -> Result<()> {
        self.check_dimension(&vector)?;
        match self.vectors.get_mut(id) {
            Some(slot) => {
                *slot = vector;
                Ok(())
            }
            None => Err(VectorStoreError::Other(format!("unknown vector id {id}"))),
        }
    }

    /// Search for the k nearest vectors among ids accepted by `allow`.
    /// Returns (id, score) sorted by score descending.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        allow: impl Fn(usize) -> bool,
    ) -> Result<Vec<(usize, f32)>> {
        self.check_dimension(query)?;

        let mut scores: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .filter(|(id, _)| allow(*id))
            .map(|(id, vector)| (id, cosine_similarity(query, vector)))
            .collect();

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scores.truncate(k);

        Ok(scores)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}
