use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use marketer_core::config::LlmConfig;
use marketer_core::domain::session::{ChatEntry, ChatRole};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Fallback system prompt for one-shot generations.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are AI marketer 360°, an expert in business growth \
strategies, analytics and automation. Answer clearly and to the point. Keep the answer within \
4096 characters.";

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub system: Vec<String>,
    pub messages: Vec<ChatEntry>,
    pub temperature: f32,
}

impl GenerationRequest {
    /// Single-prompt request under the default system prompt.
    pub fn prompt(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: vec![DEFAULT_SYSTEM_PROMPT.to_owned()],
            messages: vec![ChatEntry::user(prompt)],
            temperature,
        }
    }

    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|entry| entry.role == ChatRole::User)
            .map(|entry| entry.text.as_str())
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation transport failed: {0}")]
    Transport(String),
    #[error("generation provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generation provider returned an empty reply")]
    EmptyReply,
    #[error("generation failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<GenerationError> },
}

impl GenerationError {
    /// Client errors other than rate limiting will not improve on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::EmptyReply => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::RetriesExhausted { .. } => false,
        }
    }
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// Bounded retries with a linearly growing pause between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(800) }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_retries.saturating_add(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// Pause after the failed attempt with zero-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.saturating_add(1))
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionContent,
}

#[derive(Deserialize)]
struct CompletionContent {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI and OpenAI-compatible servers such as Ollama.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| GenerationError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.effective_base_url().trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            retry: RetryPolicy::from_config(config),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut messages: Vec<CompletionMessage<'_>> = request
            .system
            .iter()
            .map(|content| CompletionMessage { role: "system", content })
            .collect();
        messages.extend(
            request
                .messages
                .iter()
                .map(|entry| CompletionMessage { role: entry.role.as_str(), content: &entry.text }),
        );
        let body =
            CompletionBody { model: &self.model, messages, temperature: request.temperature };

        let mut call = self.http.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(api_key) = &self.api_key {
            call = call.bearer_auth(api_key.expose_secret());
        }

        let response =
            call.send().await.map_err(|error| GenerationError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status: status.as_u16(), body });
        }

        let parsed: CompletionResponse =
            response.json().await.map_err(|error| GenerationError::Transport(error.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_owned())
            .filter(|content| !content.is_empty())
            .ok_or(GenerationError::EmptyReply)
    }
}

#[async_trait]
impl GenerationClient for OpenAiCompatibleClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.attempt(&request).await {
                Ok(answer) => return Ok(answer),
                Err(error) if !error.is_transient() => return Err(error),
                Err(error) => {
                    warn!(
                        event_name = "generation.attempt_failed",
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %error,
                        "generation attempt failed"
                    );
                    if attempt + 1 >= attempts {
                        return Err(GenerationError::RetriesExhausted {
                            attempts,
                            last: Box::new(error),
                        });
                    }
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Replays canned replies in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedGenerationClient {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    fallback: Option<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerationClient {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, GenerationError>>,
    {
        Self { replies: Mutex::new(replies.into_iter().collect()), ..Self::default() }
    }

    /// Answers every request with `reply` once the script runs out.
    pub fn always(reply: impl Into<String>) -> Self {
        Self { fallback: Some(reply.into()), ..Self::default() }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }
        let next = match self.replies.lock() {
            Ok(mut replies) => replies.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        match (next, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err(GenerationError::Transport("script exhausted".to_owned())),
        }
    }
}
