//! Core data types that flow through the ingestion and conversation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A bounded slice of a document's text; the unit of caching, embedding,
/// and retrieval.
///
/// Immutable once created. `sequence_index` increases monotonically within
/// one source document and carries no meaning across documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub source_name: String,
    pub sequence_index: usize,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl DocumentChunk {
    pub fn new(
        text: impl Into<String>,
        source_name: impl Into<String>,
        sequence_index: usize,
    ) -> Self {
        let source_name = source_name.into();
        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), source_name.clone());
        Self {
            text: text.into(),
            source_name,
            sequence_index,
            metadata,
        }
    }
}

/// A chunk returned from the similarity index, scored in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Author/kind of a conversation log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    /// The model's reasoning segment, split out of the raw response.
    AssistantThink,
    /// The chunk texts that fed the current turn, in ranked order.
    RetrievedDoc,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::AssistantThink => "assistant_think",
            Role::RetrievedDoc => "retrieved_doc",
        }
    }
}

/// Message payload. `retrieved_doc` entries carry the ordered chunk texts;
/// every other role carries plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Chunks(Vec<String>),
}

impl MessageContent {
    /// Flatten to a single field for tabular export. A chunk list becomes
    /// one delimited field, never multiple rows.
    pub fn flatten(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Chunks(chunks) => chunks.join("\n\n"),
        }
    }
}

/// One entry in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

/// Where a document's bytes came from, resolved once at the boundary.
/// The pipeline itself never probes its input.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A file handle handed over by the interactive surface.
    UploadedHandle { name: String, bytes: Vec<u8> },
    /// Raw content supplied directly by a library caller.
    RawBytes { name: String, bytes: Vec<u8> },
}

impl DocumentSource {
    pub fn name(&self) -> &str {
        match self {
            DocumentSource::UploadedHandle { name, .. } => name,
            DocumentSource::RawBytes { name, .. } => name,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            DocumentSource::UploadedHandle { bytes, .. } => bytes,
            DocumentSource::RawBytes { bytes, .. } => bytes,
        }
    }
}
