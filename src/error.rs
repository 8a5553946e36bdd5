//! Error taxonomy for the pipeline.
//!
//! Propagation policy: failures local to one document in a batch are isolated
//! and reported per file; failures during a query turn abort that turn only,
//! leaving the conversation log and the index in their pre-turn state.
//! Cache I/O problems degrade to a miss or a no-op at the call site and are
//! logged rather than propagated.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Surfaces only from operations where cache I/O is the whole point
    /// (e.g. `clear`); load/store degrade silently instead.
    #[error("cache I/O failed: {0}")]
    CacheIo(#[from] std::io::Error),

    #[error("unsupported document type: {0}")]
    UnsupportedDocumentType(String),

    #[error("text extraction failed for {name}: {reason}")]
    Extraction { name: String, reason: String },

    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    #[error("inference service error: {0}")]
    InferenceService(String),

    /// The index already holds vectors from a different embedding model;
    /// cross-model vector spaces are not comparable.
    #[error("embedding model mismatch: index holds '{index_model}' vectors, embedder is '{embedder_model}'")]
    ModelMismatch {
        index_model: String,
        embedder_model: String,
    },
}
