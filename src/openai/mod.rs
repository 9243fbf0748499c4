
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::RagError;
use crate::config::OpenAiConfig;
use crate::embeddings::EmbeddingProvider;
use crate::synthesizer::{CompletionProvider, CompletionRequest};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const BACKOFF_UNIT_MS: u64 = 500;

/// Client for an OpenAI-compatible embeddings and chat-completions API.
///
/// Each HTTP attempt runs on tokio's blocking pool; retries wait on the async side, so
/// dropping a request future also stops its remaining attempts.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    embedding_model: String,
    generation_model: String,
    embedding_dimension: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: u32,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let base_url = config
            .api_url()
            .context("Failed to build API URL from config")?;
        let api_key = config
            .resolve_api_key()
            .context("No API key configured")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key,
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            embedding_dimension: config.embedding_dimension,
            agent,
            retry_attempts: config.retry_attempts.max(1),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Embed `texts` in one request; output order follows input order
    #[inline]
    pub async fn create_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Requesting {} embeddings from model {}",
            texts.len(),
            self.embedding_model
        );

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
            dimensions: self.embedding_dimension,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;

        let response_text = self
            .post_json("embeddings", request_json)
            .await
            .context("Failed to create embeddings")?;

        let response: EmbeddingResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embedding response")?;

        if response.data.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            ));
        }

        let mut data = response.data;
        data.sort_by_key(|item| item.index);
        if data.iter().enumerate().any(|(i, item)| item.index != i) {
            return Err(anyhow::anyhow!(
                "Embedding response indices are not a permutation of 0..{}",
                texts.len()
            ));
        }

        Ok(data.into_iter().map(|item| item.embedding).collect())
    }

    /// Run one chat completion with a system and a user message
    #[inline]
    pub async fn create_completion(&self, request: &CompletionRequest) -> Result<String> {
        debug!(
            "Requesting completion from model {} (temperature {}, max_tokens {})",
            self.generation_model, request.temperature, request.max_tokens
        );

        let chat = ChatRequest {
            model: &self.generation_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let request_json =
            serde_json::to_string(&chat).context("Failed to serialize completion request")?;

        let response_text = self
            .post_json("chat/completions", request_json)
            .await
            .context("Failed to create completion")?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .context("Failed to parse completion response")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("Completion response has no message content"))
    }

    async fn post_json(&self, endpoint: &str, body: String) -> Result<String> {
        let url = self
            .base_url
            .join(endpoint)
            .with_context(|| format!("Failed to build {} URL", endpoint))?;
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("POST {} attempt {}/{}", endpoint, attempt, self.retry_attempts);

            let client = self.clone();
            let target = url.clone();
            let payload = body.clone();
            let outcome = tokio::task::spawn_blocking(move || client.send_once(&target, &payload))
                .await
                .context("HTTP request task failed")?;

            let error = match outcome {
                Ok(response_text) => return Ok(response_text),
                Err(error) => error,
            };

            if !is_retryable(&error) {
                if let ureq::Error::StatusCode(status) = error {
                    warn!("Client error (status {}), not retrying", status);
                    return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                }
                warn!("Non-retryable error: {}", error);
                return Err(anyhow::anyhow!("Non-retryable error: {}", error));
            }

            warn!(
                "Retryable error: {}, attempt {}/{}",
                error, attempt, self.retry_attempts
            );
            last_error = Some(anyhow::anyhow!("Request error: {}", error));

            if attempt < self.retry_attempts {
                let delay = backoff_delay(attempt);
                debug!("Waiting {:?} before retry", delay);
                tokio::time::sleep(delay).await;
            }
        }

        error!("All retry attempts failed for request to {}", url);
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }

    fn send_once(&self, url: &Url, body: &str) -> Result<String, ureq::Error> {
        let authorization = format!("Bearer {}", self.api_key);
        self.agent
            .post(url.as_str())
            .header("Authorization", &authorization)
            .header("Content-Type", "application/json")
            .send(body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
    }
}

/// Server errors, rate limiting and transport failures are worth another attempt
fn is_retryable(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(status) => *status >= 500 || *status == 429,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => true,
        _ => false,
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let factor = EXPONENTIAL_BACKOFF_BASE.pow(attempt.saturating_sub(1));
    Duration::from_millis(factor * BACKOFF_UNIT_MS)
}

fn upstream(error: &anyhow::Error) -> RagError {
    RagError::Upstream(format!("{:#}", error))
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        self.create_embeddings(texts)
            .await
            .map_err(|e| upstream(&e))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> crate::Result<String> {
        self.create_completion(request)
            .await
            .map_err(|e| upstream(&e))
    }
}
