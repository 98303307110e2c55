//! Summarisation: send one page's recognised text to the generation service.
//!
//! The service boundary is the [`TextGenerator`] trait — a single
//! `complete(system, user)` call whose full response is awaited before
//! returning; no streaming. [`OpenAiChat`] is the production
//! implementation, speaking the `chat/completions` REST surface.
//!
//! All prompt text lives in [`crate::prompts`] so steering can change
//! without touching the retry or error-handling logic here.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 5xx responses from generation APIs are transient and
//! frequent. Exponential backoff (`retry_backoff_ms * 2^attempt`) avoids
//! hammering a recovering endpoint: with a 500 ms base and 3 retries the
//! wait sequence is 500 ms → 1 s → 2 s. Errors the service reports about
//! the request itself (bad model id, content rejection) are permanent and
//! surface immediately.

use crate::config::AnalysisConfig;
use crate::error::{PageError, PagesumError, PipelineStage};
use crate::prompts::{page_message, DEFAULT_SYSTEM_PROMPT};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// One completed generation call.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The generated message content.
    pub content: String,
    /// Prompt tokens billed, when the service reports usage.
    pub prompt_tokens: usize,
    /// Completion tokens billed, when the service reports usage.
    pub completion_tokens: usize,
}

/// Failure modes of one generation request.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The service processed the request and rejected it.
    #[error("{0}")]
    Service(String),
    /// The request failed in transit (network, auth, timeout, throttling).
    #[error("{0}")]
    Transport(String),
}

/// The text-generation service boundary.
///
/// Inject a custom implementation via
/// [`crate::config::AnalysisConfigBuilder::generator`] — tests use this
/// seam to substitute a deterministic stub.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one system + user exchange and return the full response.
    async fn complete(&self, system: &str, user: &str) -> Result<Completion, GenerationError>;
}

// ── OpenAI chat completions ──────────────────────────────────────────────

/// Summary generation via the OpenAI `chat/completions` endpoint.
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    endpoint: String,
}

impl OpenAiChat {
    /// Create a generator from the run configuration's knobs.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
        timeout_secs: u64,
    ) -> Result<Self, PagesumError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PagesumError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            max_tokens,
            endpoint: OPENAI_ENDPOINT.to_string(),
        })
    }

    /// Override the service endpoint (proxies, OpenAI-compatible hosts).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl TextGenerator for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<Completion, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&detail)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| detail.clone());
            // Throttling, auth, and server-side failures are transport
            // concerns; anything else the service decided about the
            // request itself.
            return if retryable_status(status.as_u16()) {
                Err(GenerationError::Transport(format!("HTTP {status}: {message}")))
            } else {
                Err(GenerationError::Service(message))
            };
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transport(format!("Malformed response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GenerationError::Service("Response contained no choices".to_string()))?;

        let usage = parsed.usage.unwrap_or_default();
        Ok(Completion {
            content,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}

/// Statuses worth retrying: throttling, timeouts, auth hiccups, 5xx.
fn retryable_status(status: u16) -> bool {
    matches!(status, 401 | 403 | 408 | 429) || status >= 500
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

// ── Retry wrapper ────────────────────────────────────────────────────────

/// Summarise one page's recognised text, retrying transport failures.
///
/// The text may be empty (blank page) — the service is still invoked and
/// its response recorded. Service-reported errors surface immediately as
/// [`PageError::GenerationFailed`]; transport failures are retried before
/// surfacing as [`PageError::Transport`]. Returns the completion and the
/// number of retries consumed.
pub(crate) async fn summarize_with_retry(
    generator: &Arc<dyn TextGenerator>,
    page_num: usize,
    page_text: &str,
    config: &AnalysisConfig,
) -> Result<(Completion, u8), PageError> {
    let system = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let user = page_message(page_num, page_text);

    let mut last_err = String::new();

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: generation retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match generator.complete(system, &user).await {
            Ok(completion) => {
                debug!(
                    "Page {}: {} prompt tokens, {} completion tokens",
                    page_num, completion.prompt_tokens, completion.completion_tokens
                );
                return Ok((completion, attempt as u8));
            }
            Err(GenerationError::Service(message)) => {
                return Err(PageError::GenerationFailed {
                    page: page_num,
                    message,
                });
            }
            Err(GenerationError::Transport(detail)) => {
                warn!(
                    "Page {}: generation attempt {} failed — {}",
                    page_num,
                    attempt + 1,
                    detail
                );
                last_err = detail;
            }
        }
    }

    Err(PageError::Transport {
        page: page_num,
        stage: PipelineStage::Summarization,
        retries: config.max_retries,
        detail: last_err,
    })
}
