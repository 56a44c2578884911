use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};

use cogito_llm::provider::LlmProvider;

use crate::action::ActionDispatcher;
use crate::cognition::{DecisionEngine, PerceptionAdapter};
use crate::config::AgentCfg;
use crate::error::AgentError;
use crate::memory::MemoryStore;
use crate::types::{ActionCategory, AgentResponse, Context, UserPreferences};

/// Runs perception, memory, decision and action in order for each input.
///
/// Owns every stage exclusively. `process` takes `&mut self`, so one instance
/// handles one request at a time; front-ends that need concurrency put it
/// behind [`super::worker::spawn`].
pub struct Orchestrator {
    cfg: Arc<AgentCfg>,
    perception: PerceptionAdapter,
    memory: MemoryStore,
    decision: DecisionEngine,
    action: ActionDispatcher,
    preferences: Option<UserPreferences>,
}

impl Orchestrator {
    pub fn new(cfg: Arc<AgentCfg>, provider: Arc<dyn LlmProvider>) -> Self {
        let perception = PerceptionAdapter::new(provider, cfg.sampling(), cfg.perception_timeout());
        let memory = MemoryStore::new(cfg.memory_capacity);
        let decision = DecisionEngine::new(&cfg.model, &cfg.fast_model, cfg.reasoning_chain_cap);
        let action = ActionDispatcher::new(&cfg.model);
        Self {
            cfg,
            perception,
            memory,
            decision,
            action,
            preferences: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    pub fn preferences(&self) -> Option<&UserPreferences> {
        self.preferences.as_ref()
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Install the session's preferences and record a bootstrap memory.
    /// Preferences are fixed once set; a second call is `InvalidState`.
    pub fn set_preferences(&mut self, preferences: UserPreferences) -> Result<(), AgentError> {
        if self.preferences.is_some() {
            return Err(AgentError::InvalidState("user preferences are already set".into()));
        }

        let mut metadata = Context::new();
        metadata.insert("preferences".into(), preferences.to_value());
        metadata.insert("model".into(), Value::from(self.cfg.model.as_str()));
        self.memory.add(
            format!("User preferences initialized with {}", self.cfg.model),
            metadata,
            self.cfg.bootstrap_importance,
        )?;

        self.perception.set_preferences(preferences.clone());
        self.preferences = Some(preferences);
        tracing::info!(model = %self.cfg.model, "user preferences set");
        Ok(())
    }

    /// Forget every stored interaction. Preferences and the reasoning chain
    /// stay in place.
    pub fn clear_memory(&mut self) {
        self.memory.clear();
        tracing::info!("memory cleared");
    }

    /// One full pass over `input`.
    ///
    /// Perception, memory and decision failures abort the pass. An action
    /// failure does not: the response carries `action_error` and a null output.
    pub async fn process(&mut self, input: &str) -> Result<AgentResponse, AgentError> {
        let start = Instant::now();
        let Some(preferences) = self.preferences.clone() else {
            return Err(AgentError::InvalidState(
                "user preferences not set; call set_preferences first".into(),
            ));
        };

        let perception = self.perception.process(input).await?;
        let recall = self.memory.retrieve_relevant(input, self.cfg.recall_limit);

        let mut metadata = Context::new();
        metadata.insert("confidence".into(), json!(perception.confidence));
        metadata.insert("model".into(), Value::from(self.cfg.model.as_str()));
        self.memory.add(
            perception.processed_input.clone(),
            metadata,
            self.cfg.interaction_importance,
        )?;

        let mut context = Context::new();
        context.insert("perception".into(), serde_json::to_value(&perception).unwrap_or_default());
        context.insert("memory".into(), serde_json::to_value(&recall).unwrap_or_default());
        context.insert("user_preferences".into(), preferences.to_value());
        context.insert("model".into(), Value::from(self.cfg.model.as_str()));

        let decision = self.decision.evaluate(&context, &ActionCategory::ALL, &Context::new())?;
        let result = self.action.execute(&decision.final_action);

        let execution_time = start.elapsed().as_secs_f64();
        tracing::info!(
            action = %decision.final_action.action_type,
            confidence = decision.final_action.confidence,
            success = result.success,
            recalled = recall.relevant_memories.len(),
            execution_time,
            "request processed"
        );

        Ok(AgentResponse {
            output: result.output,
            confidence: decision.final_action.confidence,
            reasoning_chain: decision.reasoning_chain,
            execution_time,
            model_used: self.cfg.model.clone(),
            action_error: result.error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogito_llm::provider::{FailingProvider, MockProvider};

    fn cfg() -> Arc<AgentCfg> {
        Arc::new(AgentCfg {
            api_key: "test".into(),
            ..AgentCfg::default()
        })
    }

    fn prefs() -> UserPreferences {
        UserPreferences::new(["chess"], "NYC", ["ai"])
    }

    #[tokio::test]
    async fn process_requires_preferences() {
        let mut o = Orchestrator::new(cfg(), Arc::new(MockProvider::new("ok")));
        let err = o.process("hello").await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidState(_)));
        assert!(o.memory().is_empty());
    }

    #[tokio::test]
    async fn full_pass_picks_respond() {
        let mut o = Orchestrator::new(cfg(), Arc::new(MockProvider::new("it is noon")));
        o.set_preferences(prefs()).unwrap();

        let resp = o.process("what time is it").await.unwrap();
        // 0.5 base + preferences + unconstrained + fast model
        assert!((resp.confidence - 0.9).abs() < 1e-9);
        assert_eq!(resp.reasoning_chain.len(), 6);
        assert_eq!(resp.model_used, "gemini-2.0-flash");
        assert!(resp.action_error.is_none());
        assert!(resp.output_text().starts_with("[gemini-2.0-flash] Responding to context:"));
        assert!(resp.output_text().contains("it is noon"));
        assert_eq!(o.memory().len(), 2);
    }

    #[tokio::test]
    async fn perception_failure_leaves_memory_untouched() {
        let mut o = Orchestrator::new(cfg(), Arc::new(FailingProvider::new("down")));
        o.set_preferences(prefs()).unwrap();
        let err = o.process("hello").await.unwrap_err();
        assert!(matches!(err, AgentError::Perception(_)));
        assert_eq!(o.memory().len(), 1);
    }

    #[tokio::test]
    async fn clear_memory_keeps_preferences() {
        let mut o = Orchestrator::new(cfg(), Arc::new(MockProvider::new("ok")));
        o.set_preferences(prefs()).unwrap();
        o.process("a").await.unwrap();
        o.clear_memory();
        assert!(o.memory().is_empty());
        assert!(o.preferences().is_some());

        let resp = o.process("b").await.unwrap();
        assert_eq!(resp.reasoning_chain.len(), 12);
        assert_eq!(o.memory().len(), 1);
    }

    #[test]
    fn preferences_are_set_once() {
        let mut o = Orchestrator::new(cfg(), Arc::new(MockProvider::new("ok")));
        o.set_preferences(prefs()).unwrap();
        let err = o.set_preferences(prefs()).unwrap_err();
        assert!(matches!(err, AgentError::InvalidState(_)));
        assert_eq!(o.memory().len(), 1);
        assert_eq!(o.memory().entries()[0].importance, 0.9);
    }
}
