//! HTTP-based text-generation providers.
//!
//! Speaks Google's native Gemini `generateContent` API, Anthropic's
//! Messages API, and OpenAI-compatible chat completions (OpenAI, DeepSeek,
//! local proxies).

use crate::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmError, LlmProvider, Role,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Wire format family, chosen from the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    Anthropic,
    OpenAi,
    DeepSeek,
    /// Spoken to as OpenAI-compatible.
    Unknown,
}

const MODEL_PREFIXES: &[(&str, ProviderKind)] = &[
    ("gemini-", ProviderKind::Google),
    ("claude-", ProviderKind::Anthropic),
    ("gpt-", ProviderKind::OpenAi),
    ("o1-", ProviderKind::OpenAi),
    ("o3-", ProviderKind::OpenAi),
    ("o4-", ProviderKind::OpenAi),
    ("deepseek-", ProviderKind::DeepSeek),
];

impl ProviderKind {
    /// Case-insensitive prefix match; anything unrecognised is `Unknown`.
    pub fn from_model(model: &str) -> Self {
        let lower = model.to_ascii_lowercase();
        MODEL_PREFIXES
            .iter()
            .find(|(prefix, _)| lower.starts_with(prefix))
            .map_or(Self::Unknown, |&(_, kind)| kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::DeepSeek => "deepseek",
            Self::Unknown => "unknown",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::Google => "https://generativelanguage.googleapis.com/v1beta",
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi | Self::Unknown => "https://api.openai.com/v1",
            Self::DeepSeek => "https://api.deepseek.com",
        }
    }
}

// ── Gemini generateContent types ──

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

// ── OpenAI-compatible request/response types ──

#[derive(Serialize)]
struct OaiRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct OaiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct OaiResponse {
    choices: Vec<OaiChoice>,
    usage: Option<OaiUsage>,
}

#[derive(Deserialize)]
struct OaiChoice {
    message: OaiChoiceMessage,
}

#[derive(Deserialize)]
struct OaiChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct OaiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ── Anthropic Messages API types ──

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<OaiMessage>,
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
    usage: Option<AnthropicUsage>,
}

/// Only text blocks matter here; anything else is skipped.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ── Provider ──

/// HTTP-based text-generation provider.
pub struct HttpProvider {
    kind: ProviderKind,
    model: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpProvider {
    /// Build from model name + API key + optional base URL override.
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Self {
        let kind = ProviderKind::from_model(&model);
        let base = base_url.unwrap_or_else(|| kind.default_base_url().to_owned());
        Self {
            kind,
            model,
            client: reqwest::Client::new(),
            base_url: base.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn endpoint(&self) -> String {
        match self.kind {
            ProviderKind::Google => {
                format!("{}/models/{}:generateContent", self.base_url, self.model)
            }
            ProviderKind::Anthropic => format!("{}/v1/messages", self.base_url),
            _ => format!("{}/chat/completions", self.base_url),
        }
    }
}

fn role_str(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Split out the system prompt; every provider here carries it separately
/// or as a leading message.
fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<&ChatMessage>) {
    let mut system: Option<String> = None;
    let mut rest = Vec::with_capacity(messages.len());
    for m in messages {
        if m.role == Role::System {
            system = Some(match system {
                Some(prev) => format!("{prev}\n\n{}", m.content),
                None => m.content.clone(),
            });
        } else {
            rest.push(m);
        }
    }
    (system, rest)
}

/// Map a non-success status to the error taxonomy.
fn check_error(status: reqwest::StatusCode, body: String) -> LlmError {
    match status {
        reqwest::StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited,
        s if s.is_server_error() => LlmError::Unavailable(format!("{s}: {body}")),
        s => LlmError::RequestFailed(format!("{s}: {body}")),
    }
}

async fn send_json<T: for<'de> Deserialize<'de>>(
    builder: reqwest::RequestBuilder,
) -> Result<T, LlmError> {
    let failed = |e: reqwest::Error| LlmError::RequestFailed(e.to_string());
    let resp = builder.send().await.map_err(failed)?;

    let status = resp.status();
    if status.is_success() {
        return resp.json().await.map_err(failed);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), body_len = body.len(), "provider returned error status");
    Err(check_error(status, body))
}

impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        match self.kind {
            ProviderKind::Google => Box::pin(self.complete_gemini(request)),
            ProviderKind::Anthropic => Box::pin(self.complete_anthropic(request)),
            _ => Box::pin(self.complete_openai(request)),
        }
    }
}

impl HttpProvider {
    /// Gemini native completion; the only path that honours every sampling knob.
    async fn complete_gemini(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (system, turns) = split_system(&request.messages);
        let s = request.sampling;
        let body = GeminiRequest {
            contents: turns.iter().map(|m| GeminiContent {
                role: Some(if m.role == Role::Assistant { "model" } else { "user" }.to_owned()),
                parts: vec![GeminiPart { text: m.content.clone() }],
            }).collect(),
            system_instruction: system.map(|text| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: s.temperature,
                top_p: s.top_p,
                top_k: s.top_k,
                max_output_tokens: s.max_output_tokens,
            },
        };

        let api: GeminiResponse = send_json(
            self.client
                .post(self.endpoint())
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
        )
        .await?;

        let Some(candidate) = api.candidates.into_iter().next() else {
            return Err(LlmError::RequestFailed("response contained no candidates".into()));
        };
        let content: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
            .unwrap_or_default();
        let (input_tokens, output_tokens) = api.usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count)).unwrap_or((0, 0));

        Ok(CompletionResponse { content, input_tokens, output_tokens })
    }

    /// OpenAI-compatible completion (OpenAI, DeepSeek, Unknown).
    /// `top_k` has no equivalent on this path and is dropped.
    async fn complete_openai(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = OaiRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(|m| OaiMessage {
                role: role_str(&m.role),
                content: m.content.clone(),
            }).collect(),
            max_tokens: request.sampling.max_output_tokens,
            temperature: request.sampling.temperature,
            top_p: request.sampling.top_p,
        };

        let api: OaiResponse = send_json(
            self.client
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        let content = api.choices.into_iter().next()
            .map(|c| c.message.content).unwrap_or_default();
        let (input_tokens, output_tokens) = api.usage
            .map(|u| (u.prompt_tokens, u.completion_tokens)).unwrap_or((0, 0));

        Ok(CompletionResponse { content, input_tokens, output_tokens })
    }

    /// Anthropic Messages API completion.
    async fn complete_anthropic(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (system, turns) = split_system(&request.messages);
        let s = request.sampling;
        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: s.max_output_tokens,
            system,
            messages: turns.iter().map(|m| OaiMessage {
                role: role_str(&m.role),
                content: m.content.clone(),
            }).collect(),
            temperature: s.temperature,
            top_p: s.top_p,
            top_k: s.top_k,
        };

        let api: AnthropicResponse = send_json(
            self.client
                .post(self.endpoint())
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .json(&body),
        )
        .await?;

        let content: String = api.content.iter().filter_map(|b| match b {
            AnthropicResponseBlock::Text { text } => Some(text.as_str()),
            AnthropicResponseBlock::Other => None,
        }).collect::<Vec<_>>().join("");

        let (input_tokens, output_tokens) = api.usage
            .map(|u| (u.input_tokens, u.output_tokens)).unwrap_or((0, 0));

        Ok(CompletionResponse { content, input_tokens, output_tokens })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SamplingParams;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn kind_from_model_prefix() {
        let cases = [
            ("gemini-2.0-flash", ProviderKind::Google),
            ("Gemini-1.5-Pro", ProviderKind::Google),
            ("claude-haiku", ProviderKind::Anthropic),
            ("GPT-4o", ProviderKind::OpenAi),
            ("o3-mini", ProviderKind::OpenAi),
            ("deepseek-chat", ProviderKind::DeepSeek),
            ("llama-3", ProviderKind::Unknown),
            ("", ProviderKind::Unknown),
        ];
        for (model, kind) in cases {
            assert_eq!(ProviderKind::from_model(model), kind, "{model}");
        }
    }

    #[test]
    fn gemini_endpoint() {
        let p = HttpProvider::new("gemini-2.0-flash".into(), "k".into(), None);
        assert_eq!(
            p.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(p.name(), "google");
    }

    #[test]
    fn anthropic_and_openai_endpoints() {
        let a = HttpProvider::new("claude-sonnet-4-6".into(), "k".into(), None);
        assert_eq!(a.endpoint(), "https://api.anthropic.com/v1/messages");
        let o = HttpProvider::new("gpt-4o".into(), "k".into(), Some("https://proxy.local/v1/".into()));
        assert_eq!(o.endpoint(), "https://proxy.local/v1/chat/completions");
    }

    #[test]
    fn split_system_merges_system_messages() {
        let msgs = vec![
            ChatMessage::system("a"),
            ChatMessage::user("hi"),
            ChatMessage::system("b"),
        ];
        let (system, rest) = split_system(&msgs);
        assert_eq!(system.as_deref(), Some("a\n\nb"));
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn gemini_sends_generation_config_and_reads_candidates() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.0-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(json!({
                "generationConfig": { "topK": 40, "maxOutputTokens": 2048 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{ "content": { "role": "model", "parts": [{ "text": "hello " }, { "text": "there" }] } }],
                    "usageMetadata": { "promptTokenCount": 7, "candidatesTokenCount": 3 }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let p = HttpProvider::new("gemini-2.0-flash".into(), "test-key".into(), Some(server.url()));
        let resp = p
            .complete(CompletionRequest::prompt("hi", SamplingParams::default()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(resp.content, "hello there");
        assert_eq!(resp.input_tokens, 7);
        assert_eq!(resp.output_tokens, 3);
    }

    #[tokio::test]
    async fn gemini_without_candidates_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-2.0-flash:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let p = HttpProvider::new("gemini-2.0-flash".into(), "k".into(), Some(server.url()));
        let err = p
            .complete(CompletionRequest::prompt("hi", SamplingParams::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn rate_limit_maps_to_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let p = HttpProvider::new("gpt-4o".into(), "k".into(), Some(server.url()));
        let err = p
            .complete(CompletionRequest::prompt("hi", SamplingParams::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
    }

    #[tokio::test]
    async fn anthropic_collects_text_blocks() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant")
            .match_body(Matcher::PartialJson(json!({ "top_k": 40, "system": "be brief" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "content": [
                        { "type": "text", "text": "four" },
                        { "type": "thinking", "thinking": "..." }
                    ],
                    "usage": { "input_tokens": 5, "output_tokens": 1 }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let p = HttpProvider::new("claude-sonnet-4-6".into(), "sk-ant".into(), Some(server.url()));
        let req = CompletionRequest {
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("2+2?")],
            sampling: SamplingParams::default(),
        };
        let resp = p.complete(req).await.unwrap();

        mock.assert_async().await;
        assert_eq!(resp.content, "four");
    }
}
