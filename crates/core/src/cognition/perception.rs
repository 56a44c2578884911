//! Perception stage: one context-injected call to the text-generation
//! provider per input.

use std::sync::Arc;
use std::time::Duration;

use cogito_llm::provider::{CompletionRequest, LlmProvider, SamplingParams};

use crate::error::AgentError;
use crate::types::{Context, PerceptionResult, UserPreferences};

/// Confidence attached to every perception result. Constant: nothing about
/// the provider response is scored.
pub const PERCEPTION_CONFIDENCE: f64 = 0.9;

pub struct PerceptionAdapter {
    provider: Arc<dyn LlmProvider>,
    sampling: SamplingParams,
    timeout: Duration,
    preferences: Option<UserPreferences>,
}

impl PerceptionAdapter {
    pub fn new(provider: Arc<dyn LlmProvider>, sampling: SamplingParams, timeout: Duration) -> Self {
        Self {
            provider,
            sampling,
            timeout,
            preferences: None,
        }
    }

    pub fn set_preferences(&mut self, preferences: UserPreferences) {
        self.preferences = Some(preferences);
    }

    pub fn preferences(&self) -> Option<&UserPreferences> {
        self.preferences.as_ref()
    }

    /// Send `input` to the provider with the user's context prepended.
    ///
    /// Fails with `InvalidState` before preferences are set, `PerceptionTimeout`
    /// when the provider exceeds the timeout, and `Perception` for any provider error.
    pub async fn process(&self, input: &str) -> Result<PerceptionResult, AgentError> {
        let Some(prefs) = &self.preferences else {
            return Err(AgentError::InvalidState(
                "user preferences not set; call set_preferences first".into(),
            ));
        };

        let request = CompletionRequest::prompt(build_prompt(prefs, input), self.sampling);
        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| AgentError::PerceptionTimeout(self.timeout.as_secs()))?
            .map_err(|e| AgentError::Perception(e.to_string()))?;

        tracing::debug!(
            provider = self.provider.name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "perception complete"
        );

        let mut context = Context::new();
        context.insert("user_preferences".into(), prefs.to_value());

        Ok(PerceptionResult {
            processed_input: response.content,
            context,
            confidence: PERCEPTION_CONFIDENCE,
        })
    }
}

/// Prompt carrying location, interests and favourite topics ahead of the raw input.
pub fn build_prompt(prefs: &UserPreferences, input: &str) -> String {
    let mut prompt = format!(
        "User Context:\n- Location: {}\n- Interests: {}\n- Favorite Topics: {}\n",
        prefs.location,
        prefs.likes.join(", "),
        prefs.favorite_topics.join(", "),
    );
    if !prefs.additional_context.is_empty() {
        let extra = serde_json::Value::Object(prefs.additional_context.clone());
        prompt.push_str(&format!("- Additional Context: {extra}\n"));
    }
    prompt.push_str(&format!("\nInput to process: {input}"));
    prompt
}
