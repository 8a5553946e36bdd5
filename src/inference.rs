//! Model-invocation abstraction and the Ollama implementation.
//!
//! [`Generator`] mirrors [`crate::embedding::Embedder`]: a trait seam for
//! tests, with [`OllamaGenerator`] calling `POST /api/generate`
//! (non-streaming) in production. Same retry/backoff policy as the
//! embedding client.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::InferenceConfig;
use crate::error::PipelineError;

/// A language model that completes a single prompt into raw response text.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, PipelineError>;
}

pub struct OllamaGenerator {
    model: String,
    url: String,
    timeout_secs: u64,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            model: config.model.clone(),
            url: config.url.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        }
    }

    pub fn with_model(config: &InferenceConfig, model: &str) -> Self {
        let mut generator = Self::new(config);
        generator.model = model.to_string();
        generator
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| PipelineError::InferenceService(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(format!("{}/api/generate", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| PipelineError::InferenceService(e.to_string()))?;
                        return parse_generate_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(PipelineError::InferenceService(format!(
                            "Ollama generate error {status}: {body_text}"
                        )));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(PipelineError::InferenceService(format!(
                        "Ollama generate error {status}: {body_text}"
                    )));
                }
                Err(e) => {
                    last_err = Some(PipelineError::InferenceService(format!(
                        "Ollama connection error (is Ollama running at {}?): {e}",
                        self.url
                    )));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            PipelineError::InferenceService("inference failed after retries".to_string())
        }))
    }
}

fn parse_generate_response(json: &serde_json::Value) -> Result<String, PipelineError> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            PipelineError::InferenceService(
                "invalid Ollama response: missing response field".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_generate_response_extracts_text() {
        let json = serde_json::json!({ "response": "hello", "done": true });
        assert_eq!(parse_generate_response(&json).unwrap(), "hello");
    }

    #[test]
    fn parse_generate_response_rejects_missing_field() {
        let json = serde_json::json!({ "done": true });
        assert!(parse_generate_response(&json).is_err());
    }
}
