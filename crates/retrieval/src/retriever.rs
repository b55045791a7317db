use crate::enrich::ContextEnricher;
use crate::error::{Result, RetrievalError};
use crate::fuzzy::FuzzySearch;
use crate::strategy::SearchParams;
use async_trait::async_trait;
use orca_protocol::{Chunk, CodeContext, CompiledFilter, Query, RetrievalResult};
use orca_vector_store::{Embedder, MemoryVectorStore, VectorSearch};
use std::sync::Arc;
use tokio::time::Instant;

const LANGUAGE_BOOST: f32 = 0.05;
const RELATED_FILE_BOOST: f32 = 0.1;
const SYMBOL_BOOST: f32 = 0.05;

/// Base retrieval primitive wrapped by the adaptive layer.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &Query, params: &SearchParams) -> Result<RetrievalResult>;

    /// Search data held locally, without embedding or upstream calls
    async fn local_search(&self, _query: &Query) -> Result<RetrievalResult> {
        Err(RetrievalError::Other("local search is not available".to_string()))
    }
}

/// Chunks available for local search
#[async_trait]
pub trait ChunkSource: Send + Sync {
    async fn chunks(&self, collection: &str) -> Vec<Chunk>;
}

#[async_trait]
impl ChunkSource for MemoryVectorStore {
    async fn chunks(&self, collection: &str) -> Vec<Chunk> {
        self.payloads(collection).await
    }
}

/// Embeds the query, searches one collection, thresholds, re-ranks and
/// optionally enriches the survivors.
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    search: Arc<dyn VectorSearch>,
    collection: String,
    enricher: Option<Arc<dyn ContextEnricher>>,
    local: Option<Arc<dyn ChunkSource>>,
}

impl VectorRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        search: Arc<dyn VectorSearch>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            search,
            collection: collection.into(),
            enricher: None,
            local: None,
        }
    }

    #[must_use]
    pub fn with_enricher(mut self, enricher: Arc<dyn ContextEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    #[must_use]
    pub fn with_local_source(mut self, source: Arc<dyn ChunkSource>) -> Self {
        self.local = Some(source);
        self
    }

    /// Convenience for the common single in-memory store setup
    pub fn over_memory_store(
        embedder: Arc<dyn Embedder>,
        store: Arc<MemoryVectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        let search: Arc<dyn VectorSearch> = store.clone();
        let local: Arc<dyn ChunkSource> = store;
        Self::new(embedder, search, collection).with_local_source(local)
    }

    async fn enrich(&self, query: &Query, chunks: &[Chunk]) -> Option<CodeContext> {
        if !query.include_context || chunks.is_empty() {
            return None;
        }
        let enricher = self.enricher.as_ref()?;
        match enricher.enrich(chunks).await {
            Ok(context) => Some(context),
            Err(err) => {
                log::warn!("Context enrichment failed, continuing without it: {err}");
                None
            }
        }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &Query, params: &SearchParams) -> Result<RetrievalResult> {
        let started = Instant::now();
        let vector = self.embedder.embed(&query.text).await?;
        let depth = params.rerank_depth.max(params.result_limit(query));
        let candidates = self
            .search
            .search(&self.collection, &vector, depth, query.filters.as_ref())
            .await?;
        let searched = candidates.len();

        let boost_context = query.context.as_ref().filter(|_| params.use_metadata);
        let mut ranked: Vec<(Chunk, f32)> = candidates
            .into_iter()
            .filter(|point| point.score >= params.similarity_threshold)
            .map(|point| {
                let boost = boost_context.map_or(0.0, |ctx| metadata_boost(&point.payload, ctx));
                let score = (point.score + boost).clamp(0.0, 1.0);
                (point.payload, score)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(params.result_limit(query));

        let (chunks, scores): (Vec<Chunk>, Vec<f32>) = ranked.into_iter().unzip();
        let context = self.enrich(query, &chunks).await;

        log::debug!(
            "Vector retrieval ({}) kept {} of {searched} candidates",
            params.tier,
            chunks.len()
        );
        Ok(RetrievalResult::new(
            query.clone(),
            chunks,
            scores,
            started.elapsed(),
            searched,
        )?
        .with_context(context))
    }

    async fn local_search(&self, query: &Query) -> Result<RetrievalResult> {
        let started = Instant::now();
        let Some(source) = &self.local else {
            return Err(RetrievalError::Other(
                "no local chunk source configured".to_string(),
            ));
        };

        let mut chunks = source.chunks(&self.collection).await;
        if let Some(filters) = &query.filters {
            let compiled = CompiledFilter::compile(filters)?;
            chunks.retain(|chunk| compiled.matches(chunk));
        }
        let searched = chunks.len();

        let hits = FuzzySearch::new().search(&query.text, &chunks, query.max_results);
        let mut picked = Vec::with_capacity(hits.len());
        let mut scores = Vec::with_capacity(hits.len());
        for (idx, score) in hits {
            if let Some(chunk) = chunks.get(idx) {
                picked.push(chunk.clone());
                scores.push(score);
            }
        }

        log::debug!("Local search matched {} of {searched} chunks", picked.len());
        Ok(RetrievalResult::new(
            query.clone(),
            picked,
            scores,
            started.elapsed(),
            searched,
        )?)
    }
}

/// Small score bonus for chunks that line up with the caller's code context
fn metadata_boost(chunk: &Chunk, context: &CodeContext) -> f32 {
    let mut boost = 0.0;
    if chunk.language.eq_ignore_ascii_case(&context.language) {
        boost += LANGUAGE_BOOST;
    }
    let related = context.file_path.as_deref() == Some(chunk.file_path.as_str())
        || context.related_files.iter().any(|f| *f == chunk.file_path);
    if related {
        boost += RELATED_FILE_BOOST;
    }
    if let Some(symbol) = &chunk.symbol {
        let referenced = context
            .dependencies
            .iter()
            .chain(&context.callers)
            .any(|name| name.contains(symbol.as_str()));
        if referenced {
            boost += SYMBOL_BOOST;
        }
    }
    boost
}
