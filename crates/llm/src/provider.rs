use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Sampling parameters forwarded verbatim to the provider.
/// Providers that lack a knob (e.g. `top_k` on OpenAI) ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 2048,
        }
    }
}

/// LLM completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
}

impl CompletionRequest {
    /// Single-turn request carrying one user prompt.
    pub fn prompt(prompt: impl Into<String>, sampling: SamplingParams) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            sampling,
        }
    }
}

/// LLM completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Concatenation of all text parts returned by the model.
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited")]
    RateLimited,
    #[error("request failed: {0}")]
    RequestFailed(String),
}

/// Trait for text-generation providers (Gemini, Claude, OpenAI, etc.)
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>>;
}

/// Mock provider for testing: returns a fixed response and remembers the
/// last request it saw.
#[derive(Debug)]
pub struct MockProvider {
    pub response: String,
    delay: Option<Duration>,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            delay: None,
            last_request: Mutex::new(None),
        }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(response: impl Into<String>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(response)
        }
    }

    /// The most recent request passed to `complete`, if any.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        if let Ok(mut slot) = self.last_request.lock() {
            *slot = Some(request);
        }
        let content = self.response.clone();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(CompletionResponse {
                content,
                input_tokens: 10,
                output_tokens: 20,
            })
        })
    }
}

/// Provider that always fails with `RequestFailed(message)`.
#[derive(Debug, Clone)]
pub struct FailingProvider {
    pub message: String,
}

impl FailingProvider {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl LlmProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        let message = self.message.clone();
        Box::pin(async move { Err(LlmError::RequestFailed(message)) })
    }
}
