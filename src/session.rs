//! Explicit per-session state and the top-level pipeline facade.
//!
//! Everything a conversation needs — log, index, ingestor, providers,
//! runtime-adjustable settings — lives in one owned [`Session`] value.
//! No globals; two sessions never share state.

use tracing::info;

use crate::cache::ChunkCache;
use crate::config::Config;
use crate::embedding::{Embedder, OllamaEmbedder};
use crate::error::PipelineError;
use crate::history::{ChatStats, ConversationLog};
use crate::index::SimilarityIndex;
use crate::inference::{Generator, OllamaGenerator};
use crate::ingest::{IngestOutcome, IngestReport, Ingestor};
use crate::models::DocumentSource;
use crate::turn::{self, TurnOutcome, TurnSettings};

pub struct Session {
    pub settings: TurnSettings,
    log: ConversationLog,
    index: SimilarityIndex,
    ingestor: Ingestor,
    embedder: Box<dyn Embedder>,
    generator: Box<dyn Generator>,
}

impl Session {
    /// Build a session wired to the Ollama providers named in `config`.
    pub fn new(config: &Config) -> Result<Self, PipelineError> {
        Self::with_providers(
            config,
            Box::new(OllamaEmbedder::new(&config.embedding)),
            Box::new(OllamaGenerator::new(&config.inference)),
        )
    }

    /// Build a session with caller-supplied providers. The cache directory
    /// still comes from `config`, so tests point it at a temp dir.
    pub fn with_providers(
        config: &Config,
        embedder: Box<dyn Embedder>,
        generator: Box<dyn Generator>,
    ) -> Result<Self, PipelineError> {
        let cache = ChunkCache::new(config.cache.dir.clone())?;
        let index = SimilarityIndex::new(embedder.model_id());
        Ok(Self {
            settings: TurnSettings {
                rag_enabled: true,
                similarity_threshold: config.retrieval.similarity_threshold,
                max_results: config.retrieval.max_results,
            },
            log: ConversationLog::new(),
            index,
            ingestor: Ingestor::new(cache, config.chunking.clone()),
            embedder,
            generator,
        })
    }

    // ============ Ingestion ============

    pub async fn ingest(
        &mut self,
        source: &DocumentSource,
    ) -> Result<IngestOutcome, PipelineError> {
        self.ingestor
            .ingest(&mut self.index, self.embedder.as_ref(), source)
            .await
    }

    pub async fn ingest_batch(&mut self, sources: &[DocumentSource]) -> Vec<IngestReport> {
        self.ingestor
            .ingest_batch(&mut self.index, self.embedder.as_ref(), sources)
            .await
    }

    // ============ Conversation ============

    /// Run one turn; on success the log gains the turn's messages.
    pub async fn ask(&mut self, prompt: &str) -> Result<TurnOutcome, PipelineError> {
        turn::run_turn(
            &self.index,
            self.embedder.as_ref(),
            self.generator.as_ref(),
            self.settings,
            &mut self.log,
            prompt,
        )
        .await
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn stats(&self) -> ChatStats {
        self.log.stats()
    }

    pub fn export_csv(&self, path: &std::path::Path) -> std::io::Result<()> {
        self.log.export_csv(path)
    }

    pub fn clear_history(&mut self) {
        self.log.clear();
    }

    // ============ Documents & models ============

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    /// Drop all indexed documents and the processed-name registry. The
    /// conversation log and the on-disk cache are untouched.
    pub fn clear_documents(&mut self) {
        self.index.clear();
        info!("document index cleared");
    }

    /// Swap the embedding provider. Returns `true` when the index already
    /// held vectors from the previous model, meaning its contents are stale
    /// until documents are re-ingested.
    pub fn set_embedding_model(&mut self, embedder: Box<dyn Embedder>) -> bool {
        let stale = self.index.set_model(embedder.model_id());
        self.embedder = embedder;
        stale
    }

    pub fn set_generator(&mut self, generator: Box<dyn Generator>) {
        self.generator = generator;
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_id()
    }

    pub fn inference_model(&self) -> &str {
        self.generator.model_id()
    }
}
