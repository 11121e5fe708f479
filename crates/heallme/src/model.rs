//! Text-generation seam and its OpenRouter implementation.
//!
//! The orchestrator only needs "prompt in, text out". [`TextModel`] captures
//! that as a dyn-compatible trait with a boxed future; [`OpenRouterModel`]
//! implements it over the OpenRouter chat completions API using a pooled
//! `reqwest::Client` that is safe to share between concurrent requests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ModelError;

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Upper bound on generated tokens per call.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Boxed future returned by [`TextModel::generate`].
pub type ModelFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ModelError>> + Send + 'a>>;

/// A language model reachable with a single prompt.
pub trait TextModel: Send + Sync {
    /// Generate a completion for `prompt`. One attempt, no retries.
    fn generate<'a>(&'a self, prompt: &'a str) -> ModelFuture<'a>;

    /// Model identifier, for logging.
    fn name(&self) -> &str;
}

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

#[derive(Deserialize, Debug)]
struct UsageInfo {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// OpenRouter-backed [`TextModel`].
pub struct OpenRouterModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    timeout: Duration,
    temperature: f32,
}

impl OpenRouterModel {
    /// Create a model on a shared HTTP client. `timeout` bounds each call.
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: OPENROUTER_URL.to_string(),
            timeout,
            temperature: 0.4,
        }
    }

    /// Point at a different chat-completions endpoint (self-hosted gateways, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [WireMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: self.temperature,
        };
        debug!(
            "LLM request: model={}, prompt={} chars, timeout={}s",
            self.model,
            prompt.chars().count(),
            self.timeout.as_secs()
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(&body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: RawChatResponse =
            serde_json::from_str(&text).map_err(|e| ModelError::Decode(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(ModelError::Api(err.message));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
            );
        }

        parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)
    }
}

impl TextModel for OpenRouterModel {
    fn generate<'a>(&'a self, prompt: &'a str) -> ModelFuture<'a> {
        Box::pin(self.complete(prompt))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ── Scripted model ─────────────────────────────────────────────────

/// A [`TextModel`] that replays queued replies and records every prompt.
///
/// When the queue runs dry the last reply is repeated; an empty script
/// answers with [`ModelError::EmptyResponse`].
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    last: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new().then_reply(text)
    }

    /// Answer the next call with a failure.
    pub fn failing(error: ModelError) -> Self {
        Self::new().then_fail(error)
    }

    pub fn then_reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    pub fn then_fail(self, error: ModelError) -> Self {
        self.push(Err(error));
        self
    }

    /// Sleep before answering, to exercise cancellation and timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn push(&self, reply: Result<String, ModelError>) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    fn next_reply(&self) -> Result<String, ModelError> {
        let queued = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        match queued {
            Some(Ok(text)) => {
                *last = Some(text.clone());
                Ok(text)
            }
            Some(Err(e)) => Err(e),
            None => last.clone().ok_or(ModelError::EmptyResponse),
        }
    }
}

impl TextModel for ScriptedModel {
    fn generate<'a>(&'a self, prompt: &'a str) -> ModelFuture<'a> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.next_reply()
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
