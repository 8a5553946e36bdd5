//! Document ingestion pipeline.
//!
//! Orchestrates the path from raw bytes to indexed vectors:
//! duplicate check, cache lookup, extract, chunk, cache store, index add.
//! Batch ingestion isolates failures per document so one bad file never
//! sinks the rest.

use tracing::info;

use crate::cache::ChunkCache;
use crate::chunker;
use crate::config::ChunkingConfig;
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::index::SimilarityIndex;
use crate::models::DocumentSource;

/// What happened to a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The session already indexed a document with this name; nothing done.
    AlreadyProcessed,
    /// The document was chunked (or restored from cache) and indexed.
    Ingested { chunks: usize, cache_hit: bool },
}

/// Per-document result of a batch run.
#[derive(Debug)]
pub struct IngestReport {
    pub name: String,
    pub result: Result<IngestOutcome, PipelineError>,
}

pub struct Ingestor {
    cache: ChunkCache,
    chunking: ChunkingConfig,
}

impl Ingestor {
    pub fn new(cache: ChunkCache, chunking: ChunkingConfig) -> Self {
        Self { cache, chunking }
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    /// Ingest one document into `index`.
    ///
    /// A document name already marked processed in this index generation is
    /// skipped outright, before any hashing or I/O. The name is marked
    /// processed only after the chunks land in the index, so a failed
    /// attempt can be retried.
    pub async fn ingest(
        &self,
        index: &mut SimilarityIndex,
        embedder: &dyn Embedder,
        source: &DocumentSource,
    ) -> Result<IngestOutcome, PipelineError> {
        let name = source.name();
        if index.is_processed(name) {
            info!("skipping already-processed document: {}", name);
            return Ok(IngestOutcome::AlreadyProcessed);
        }

        let key = ChunkCache::compute_key(source.bytes(), name);
        let (chunks, cache_hit) = match self.cache.load(&key) {
            Some(chunks) => (chunks, true),
            None => {
                let text = crate::extract::extract_text(name, source.bytes())?;
                let chunks = chunker::split(&text, name, &self.chunking);
                self.cache.store(&key, &chunks);
                (chunks, false)
            }
        };

        let count = chunks.len();
        index.add(embedder, chunks).await?;
        index.mark_processed(name);
        info!(
            "ingested {}: {} chunks ({})",
            name,
            count,
            if cache_hit { "cache hit" } else { "processed" }
        );
        Ok(IngestOutcome::Ingested {
            chunks: count,
            cache_hit,
        })
    }

    /// Ingest several documents, continuing past per-document failures.
    /// Reports preserve input order.
    pub async fn ingest_batch(
        &self,
        index: &mut SimilarityIndex,
        embedder: &dyn Embedder,
        sources: &[DocumentSource],
    ) -> Vec<IngestReport> {
        let mut reports = Vec::with_capacity(sources.len());
        for source in sources {
            let result = self.ingest(index, embedder, source).await;
            reports.push(IngestReport {
                name: source.name().to_string(),
                result,
            });
        }
        reports
    }
}
