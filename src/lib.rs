//! docchat: a retrieval-augmented chat pipeline over local documents.
//!
//! Documents are extracted, chunked, cached by content hash, embedded via a
//! local Ollama instance, and retrieved per question with a threshold-gated
//! similarity search; answers come from a local inference model using one of
//! two fixed prompt templates. All state is per-[`session::Session`].
//!
//! Module map:
//! - [`config`] — TOML configuration with defaults and validation
//! - [`models`] — chunk, message, and document-source types
//! - [`error`] — pipeline error taxonomy
//! - [`cache`] — content-addressed on-disk chunk cache
//! - [`chunker`] — deterministic recursive text splitting with overlap
//! - [`extract`] — per-format text extraction (txt, pdf)
//! - [`embedding`] — [`embedding::Embedder`] trait and Ollama client
//! - [`inference`] — [`inference::Generator`] trait and Ollama client
//! - [`index`] — in-memory similarity index with model-identity guard
//! - [`ingest`] — bytes-to-index pipeline with per-document isolation
//! - [`respond`] — `<think>` reasoning-segment splitting
//! - [`turn`] — single-turn orchestration and prompt templates
//! - [`history`] — append-only conversation log and CSV export
//! - [`session`] — the owned, explicit session facade

pub mod cache;
pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod history;
pub mod index;
pub mod inference;
pub mod ingest;
pub mod models;
pub mod respond;
pub mod session;
pub mod turn;
