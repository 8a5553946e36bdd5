//! One conversational turn: retrieve, prompt, generate, log.

use tracing::debug;

use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::history::ConversationLog;
use crate::index::SimilarityIndex;
use crate::inference::Generator;
use crate::models::{MessageContent, RetrievalResult, Role};
use crate::respond;

/// Retrieval parameters for a single turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnSettings {
    pub rag_enabled: bool,
    pub similarity_threshold: f32,
    pub max_results: usize,
}

/// Everything a caller needs to render one completed turn.
#[derive(Debug)]
pub struct TurnOutcome {
    pub answer: String,
    pub reasoning: Option<String>,
    pub retrieved: Vec<RetrievalResult>,
    /// Whether the inference prompt actually carried retrieved context.
    pub used_context: bool,
}

pub fn build_rag_prompt(context: &str, prompt: &str) -> String {
    format!(
        "[Retrieved content]\n{context}\n\n[User question]\n{prompt}\n\nAnswer strictly from the retrieved content."
    )
}

pub fn build_plain_prompt(prompt: &str) -> String {
    format!("[User question]\n{prompt}\n\nProvide an accurate, helpful answer.")
}

/// Run one turn against the given providers.
///
/// Retrieval runs only when enabled, and silently yields no context on an
/// empty index. A turn that retrieves nothing above threshold falls back to
/// the plain prompt. Nothing is appended to `log` unless the whole turn
/// succeeds; a failed turn leaves the log exactly as it was.
pub async fn run_turn(
    index: &SimilarityIndex,
    embedder: &dyn Embedder,
    generator: &dyn Generator,
    settings: TurnSettings,
    log: &mut ConversationLog,
    prompt: &str,
) -> Result<TurnOutcome, PipelineError> {
    let retrieved = if settings.rag_enabled {
        index
            .search(
                embedder,
                prompt,
                settings.similarity_threshold,
                settings.max_results,
            )
            .await?
    } else {
        Vec::new()
    };

    let context = retrieved
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let used_context = !context.is_empty();

    let full_prompt = if used_context {
        build_rag_prompt(&context, prompt)
    } else {
        build_plain_prompt(prompt)
    };
    debug!(
        "turn: rag={} retrieved={} context={}",
        settings.rag_enabled,
        retrieved.len(),
        used_context
    );

    let raw = generator.generate(&full_prompt).await?;
    let parsed = respond::parse_response(&raw);

    // The turn is now known good; record it atomically.
    log.add_message(Role::User, MessageContent::Text(prompt.to_string()));
    log.add_message(Role::Assistant, MessageContent::Text(parsed.answer.clone()));
    if let Some(reasoning) = &parsed.reasoning {
        log.add_message(Role::AssistantThink, MessageContent::Text(reasoning.clone()));
    }
    if !retrieved.is_empty() {
        log.add_message(
            Role::RetrievedDoc,
            MessageContent::Chunks(
                retrieved.iter().map(|r| r.chunk.text.clone()).collect(),
            ),
        );
    }

    Ok(TurnOutcome {
        answer: parsed.answer,
        reasoning: parsed.reasoning,
        retrieved,
        used_context,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::models::DocumentChunk;

    struct FixedEmbedder {
        model: String,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_id(&self) -> &str {
            &self.model
        }

        // Every text maps to the same unit vector, so every indexed chunk
        // scores 1.0 against any query.
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    struct RecordingGenerator {
        response: String,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingGenerator {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        fn model_id(&self) -> &str {
            "recording-model"
        }

        async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.response.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        fn model_id(&self) -> &str {
            "failing-model"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, PipelineError> {
            Err(PipelineError::InferenceService("down".to_string()))
        }
    }

    fn settings(rag: bool) -> TurnSettings {
        TurnSettings {
            rag_enabled: rag,
            similarity_threshold: 0.7,
            max_results: 3,
        }
    }

    async fn populated_index(embedder: &FixedEmbedder) -> SimilarityIndex {
        let mut index = SimilarityIndex::new(embedder.model.clone());
        index
            .add(
                embedder,
                vec![DocumentChunk::new("relevant fact", "a.txt", 0)],
            )
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn rag_turn_uses_the_rag_template_and_logs_four_roles() {
        let embedder = FixedEmbedder {
            model: "m".into(),
        };
        let index = populated_index(&embedder).await;
        let generator = RecordingGenerator::new("<think>because</think>the answer");
        let mut log = ConversationLog::new();

        let outcome = run_turn(&index, &embedder, &generator, settings(true), &mut log, "q?")
            .await
            .unwrap();

        assert_eq!(
            generator.last_prompt(),
            build_rag_prompt("relevant fact", "q?")
        );
        assert!(outcome.used_context);
        assert_eq!(outcome.answer, "the answer");
        assert_eq!(outcome.reasoning.as_deref(), Some("because"));

        let roles: Vec<_> = log.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::User,
                Role::Assistant,
                Role::AssistantThink,
                Role::RetrievedDoc
            ]
        );
    }

    #[tokio::test]
    async fn empty_index_falls_back_to_plain_template() {
        let embedder = FixedEmbedder {
            model: "m".into(),
        };
        let index = SimilarityIndex::new("m");
        let generator = RecordingGenerator::new("the answer");
        let mut log = ConversationLog::new();

        let outcome = run_turn(&index, &embedder, &generator, settings(true), &mut log, "q?")
            .await
            .unwrap();

        assert_eq!(generator.last_prompt(), build_plain_prompt("q?"));
        assert!(!outcome.used_context);
        assert!(outcome.retrieved.is_empty());

        let roles: Vec<_> = log.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn rag_disabled_skips_retrieval_even_with_content() {
        let embedder = FixedEmbedder {
            model: "m".into(),
        };
        let index = populated_index(&embedder).await;
        let generator = RecordingGenerator::new("plain answer");
        let mut log = ConversationLog::new();

        let outcome = run_turn(&index, &embedder, &generator, settings(false), &mut log, "q?")
            .await
            .unwrap();

        assert_eq!(generator.last_prompt(), build_plain_prompt("q?"));
        assert!(outcome.retrieved.is_empty());
    }

    #[tokio::test]
    async fn failed_generation_leaves_log_untouched() {
        let embedder = FixedEmbedder {
            model: "m".into(),
        };
        let index = populated_index(&embedder).await;
        let mut log = ConversationLog::new();

        let result = run_turn(
            &index,
            &embedder,
            &FailingGenerator,
            settings(true),
            &mut log,
            "q?",
        )
        .await;

        assert!(result.is_err());
        assert!(log.is_empty());
    }
}
