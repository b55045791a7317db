use crate::error::{Result, VectorStoreError};
use crate::flat_index::FlatIndex;
use crate::types::ScoredPoint;
use async_trait::async_trait;
use orca_protocol::{Chunk, CompiledFilter, RetrievalFilter};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Scored candidate source. The retrieval core sees nothing else of the store.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&RetrievalFilter>,
    ) -> Result<Vec<ScoredPoint>>;
}

struct Collection {
    index: FlatIndex,
    payloads: Vec<Chunk>,
    ids: HashMap<String, usize>,
}

impl Collection {
    fn new(dimension: usize) -> Self {
        Self {
            index: FlatIndex::new(dimension),
            payloads: Vec::new(),
            ids: HashMap::new(),
        }
    }
}

/// In-process collections of chunk payloads and their vectors.
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    pub fn point_id(chunk: &Chunk) -> String {
        format!("{}:{}:{}", chunk.file_path, chunk.start_line, chunk.end_line)
    }

    /// Insert or replace points; returns their ids in input order.
    pub async fn upsert(
        &self,
        collection: &str,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<String>> {
        if chunks.len() != vectors.len() {
            return Err(VectorStoreError::Other(format!(
                "upsert needs one vector per chunk ({} chunks, {} vectors)",
                chunks.len(),
                vectors.len()
            )));
        }
        let Some(dimension) = vectors.first().map(Vec::len) else {
            return Ok(Vec::new());
        };

        let mut collections = self.collections.write().await;
        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection::new(dimension));

        let mut ids = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            let id = Self::point_id(&chunk);
            match entry.ids.get(&id) {
                Some(&slot) => {
                    entry.index.replace(slot, vector)?;
                    entry.payloads[slot] = chunk;
                }
                None => {
                    let slot = entry.index.push(vector)?;
                    entry.payloads.push(chunk);
                    entry.ids.insert(id.clone(), slot);
                }
            }
            ids.push(id);
        }

        log::debug!(
            "Upserted {} points into '{collection}' (total {})",
            ids.len(),
            entry.payloads.len()
        );
        Ok(ids)
    }

    /// Every payload held in `collection`
    pub async fn payloads(&self, collection: &str) -> Vec<Chunk> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.payloads.clone())
            .unwrap_or_default()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |c| c.payloads.len())
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorSearch for MemoryVectorStore {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&RetrievalFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let compiled = filter.map(CompiledFilter::compile).transpose()?;
        let collections = self.collections.read().await;
        let entry = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;

        let hits = entry.index.search(vector, limit, |id| {
            compiled
                .as_ref()
                .map_or(true, |f| f.matches(&entry.payloads[id]))
        })?;

        log::debug!("Found {} candidates in '{collection}'", hits.len());
        Ok(hits
            .into_iter()
            .map(|(id, score)| ScoredPoint {
                payload: entry.payloads[id].clone(),
                score,
            })
            .collect())
    }
}
