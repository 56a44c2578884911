use std::collections::VecDeque;

use serde_json::Value;

use crate::error::AgentError;
use crate::types::{ActionCategory, Context, Decision, DecisionResponse};

/// Additive confidence heuristic. Not a calibrated probability.
///
/// - base 0.5
/// - +0.2 when the context carries `user_preferences`
/// - +0.1 when no constraints are given
/// - +0.1 when `context["model"]` is the fast model
/// - clamped to 1.0
const BASE_CONFIDENCE: f64 = 0.5;
const PREFERENCE_BONUS: f64 = 0.2;
const UNCONSTRAINED_BONUS: f64 = 0.1;
const FAST_MODEL_BONUS: f64 = 0.1;

/// Scores candidate actions and keeps a session-long reasoning chain.
///
/// The chain accumulates across `evaluate` calls for the engine's lifetime;
/// once it reaches `chain_cap` lines the oldest are dropped.
#[derive(Debug)]
pub struct DecisionEngine {
    model: String,
    fast_model: String,
    reasoning_chain: VecDeque<String>,
    chain_cap: usize,
}

impl DecisionEngine {
    pub fn new(model: impl Into<String>, fast_model: impl Into<String>, chain_cap: usize) -> Self {
        Self {
            model: model.into(),
            fast_model: fast_model.into(),
            reasoning_chain: VecDeque::new(),
            chain_cap: chain_cap.max(1),
        }
    }

    /// Score every category in `available` (order decides ties) and pick the
    /// first one with the highest confidence.
    pub fn evaluate(
        &mut self,
        context: &Context,
        available: &[ActionCategory],
        constraints: &Context,
    ) -> Result<DecisionResponse, AgentError> {
        if available.is_empty() {
            return Err(AgentError::Validation("no candidate actions to evaluate".into()));
        }

        let mut decisions = Vec::with_capacity(available.len());
        for &action in available {
            let confidence = self.confidence(context, constraints);
            let reasoning = self.reasoning(action, context);
            self.push_step(format!("Evaluated {action}: {reasoning}"));

            decisions.push(Decision {
                action_type: action,
                parameters: self.parameters(action, context),
                confidence,
                reasoning,
                model: self.model.clone(),
            });
        }

        let mut best = 0;
        for (i, d) in decisions.iter().enumerate().skip(1) {
            if d.confidence > decisions[best].confidence {
                best = i;
            }
        }
        let final_action = decisions[best].clone();

        tracing::debug!(
            action = %final_action.action_type,
            confidence = final_action.confidence,
            candidates = decisions.len(),
            "decision selected"
        );

        Ok(DecisionResponse {
            decisions,
            final_action,
            reasoning_chain: self.reasoning_chain(),
            model: self.model.clone(),
        })
    }

    /// Snapshot of the accumulated chain, oldest first.
    pub fn reasoning_chain(&self) -> Vec<String> {
        self.reasoning_chain.iter().cloned().collect()
    }

    /// Drop the accumulated chain.
    pub fn reset(&mut self) {
        self.reasoning_chain.clear();
    }

    fn confidence(&self, context: &Context, constraints: &Context) -> f64 {
        let mut c = BASE_CONFIDENCE;
        if context.contains_key("user_preferences") {
            c += PREFERENCE_BONUS;
        }
        if constraints.is_empty() {
            c += UNCONSTRAINED_BONUS;
        }
        if context_model(context) == Some(self.fast_model.as_str()) {
            c += FAST_MODEL_BONUS;
        }
        c.min(1.0)
    }

    fn reasoning(&self, action: ActionCategory, context: &Context) -> String {
        let model = context_model(context).unwrap_or(&self.model);
        format!(
            "Using {model}: Action {action} is appropriate given the context: {}",
            Value::Object(context.clone())
        )
    }

    fn parameters(&self, action: ActionCategory, context: &Context) -> Context {
        let model = context_model(context).unwrap_or(&self.model);
        let mut params = Context::new();
        params.insert("context".into(), Value::Object(context.clone()));
        params.insert("action_type".into(), Value::from(action.as_str()));
        params.insert("model".into(), Value::from(model));
        params
    }

    fn push_step(&mut self, step: String) {
        self.reasoning_chain.push_back(format!("[{}] {step}", self.model));
        while self.reasoning_chain.len() > self.chain_cap {
            self.reasoning_chain.pop_front();
        }
    }
}

fn context_model(context: &Context) -> Option<&str> {
    context.get("model").and_then(Value::as_str)
}
