use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LlmError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Upper bound for one HTTP round trip to a model or embedding endpoint.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One prompt for the model, with optional system instructions.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 500,
            temperature: 0.7,
        }
    }

    #[must_use]
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A hosted text model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the trimmed reply text.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` when the model is disabled, unreachable, or
    /// replies with nothing.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Ask the model and fall back to fixed text on any failure.
pub async fn complete_or(model: &dyn LanguageModel, request: CompletionRequest, fallback: &str) -> String {
    match model.complete(request).await {
        Ok(reply) => reply,
        Err(LlmError::Disabled) => fallback.to_string(),
        Err(err) => {
            warn!(error = %err, "language model unavailable, using fallback text");
            fallback.to_string()
        }
    }
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub attempts: u32,
    pub retry_delay: Duration,
    /// Per attempt; a timed-out attempt counts as a failure and is retried.
    pub timeout: Duration,
}

impl LlmConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            attempts: DEFAULT_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// `None` when no usable key is given, which disables the model.
    #[must_use]
    pub fn from_parts(base_url: &str, api_key: Option<&str>, model: &str) -> Option<Self> {
        let api_key = api_key?.trim();
        if api_key.is_empty() {
            return None;
        }
        Some(Self::new(base_url, api_key, model))
    }
}

/// Client for any `/chat/completions` endpoint speaking the `OpenAI` wire format.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    config: Option<LlmConfig>,
}

impl OpenAiCompatibleClient {
    #[must_use]
    pub fn new(config: Option<LlmConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    async fn send(&self, config: &LlmConfig, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        });
        let payload = ChatRequest {
            model: config.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .timeout(config.timeout)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LlmError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(content)
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let config = self.config.as_ref().ok_or(LlmError::Disabled)?;
        let attempts = config.attempts.max(1);

        let mut last_error = LlmError::EmptyResponse;
        for attempt in 1..=attempts {
            match self.send(config, &request).await {
                Ok(content) => {
                    debug!(attempt, chars = content.len(), "language model replied");
                    return Ok(content);
                }
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "language model call failed");
                    last_error = err;
                    if attempt < attempts {
                        tokio::time::sleep(config.retry_delay).await;
                    }
                }
            }
        }
        Err(last_error)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
