//! In-memory similarity index.
//!
//! A pure vector container: embeds chunks under one embedding-model identity
//! and answers threshold-gated nearest-neighbor queries. Owns no caching
//! logic. Also tracks which document names have been ingested in the current
//! index generation, so the pipeline can skip duplicates; that registry is
//! reset by [`SimilarityIndex::clear`] and deliberately *not* by
//! [`SimilarityIndex::set_model`].

use std::collections::HashSet;
use tracing::debug;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::PipelineError;
use crate::models::{DocumentChunk, RetrievalResult};

/// A chunk plus its vector under the index's embedding-model identity.
struct IndexedChunk {
    chunk: DocumentChunk,
    vector: Vec<f32>,
}

pub struct SimilarityIndex {
    model_id: String,
    entries: Vec<IndexedChunk>,
    processed: HashSet<String>,
}

/// Map cosine similarity from `[-1, 1]` into the `[0, 1]` relevance space
/// the retrieval threshold is expressed in.
fn relevance(a: &[f32], b: &[f32]) -> f32 {
    ((cosine_similarity(a, b) + 1.0) / 2.0).clamp(0.0, 1.0)
}

impl SimilarityIndex {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            entries: Vec::new(),
            processed: HashSet::new(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embed `chunks` and insert them. The embedder's model identity must
    /// match the index's; mixing vector spaces is forbidden.
    pub async fn add(
        &mut self,
        embedder: &dyn Embedder,
        chunks: Vec<DocumentChunk>,
    ) -> Result<usize, PipelineError> {
        if embedder.model_id() != self.model_id {
            return Err(PipelineError::ModelMismatch {
                index_model: self.model_id.clone(),
                embedder_model: embedder.model_id().to_string(),
            });
        }
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(PipelineError::EmbeddingService(format!(
                "embedding count mismatch: sent {} texts, got {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let added = chunks.len();
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            self.entries.push(IndexedChunk { chunk, vector });
        }
        debug!("indexed {} chunks ({} total)", added, self.entries.len());
        Ok(added)
    }

    /// Score every indexed chunk against `query`, keep those at or above
    /// `threshold`, sorted descending, truncated to `max_results`.
    ///
    /// An empty index returns an empty result without touching the
    /// embedder — nothing indexed is not an error.
    pub async fn search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        threshold: f32,
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>, PipelineError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if embedder.model_id() != self.model_id {
            return Err(PipelineError::ModelMismatch {
                index_model: self.model_id.clone(),
                embedder_model: embedder.model_id().to_string(),
            });
        }

        let query_vec = embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PipelineError::EmbeddingService("empty embedding response".to_string())
            })?;

        let mut results: Vec<RetrievalResult> = self
            .entries
            .iter()
            .map(|entry| RetrievalResult {
                chunk: entry.chunk.clone(),
                score: relevance(&query_vec, &entry.vector),
            })
            .filter(|r| r.score >= threshold)
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(max_results);
        Ok(results)
    }

    /// Change the model identity used for future `add`/`search` calls.
    ///
    /// Existing vectors are neither re-embedded nor dropped; returns `true`
    /// when the index already held vectors under a different model, meaning
    /// retrieval results are now unreliable and affected documents need
    /// reprocessing. The processed-name registry is left alone — clearing
    /// it requires an explicit [`clear`](SimilarityIndex::clear).
    pub fn set_model(&mut self, model_id: &str) -> bool {
        if self.model_id == model_id {
            return false;
        }
        let stale = !self.entries.is_empty();
        self.model_id = model_id.to_string();
        stale
    }

    /// Drop all indexed vectors and reset the processed-name registry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.processed.clear();
    }

    // ============ Processed-document registry ============

    pub fn is_processed(&self, name: &str) -> bool {
        self.processed.contains(name)
    }

    pub fn mark_processed(&mut self, name: &str) {
        self.processed.insert(name.to_string());
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn processed_names(&self) -> impl Iterator<Item = &str> {
        self.processed.iter().map(String::as_str)
    }
}
