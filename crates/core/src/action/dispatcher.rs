use std::time::Instant;

use serde_json::{Value, json};

use super::calculator;
use crate::error::AgentError;
use crate::types::{ActionCategory, ActionResult, Context, Decision};

/// Executes the selected decision with a stub handler per category.
///
/// Handler failures never escape `execute`; they come back as a failed
/// `ActionResult` with the elapsed time still filled in.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    model: String,
    handlers: Vec<ActionCategory>,
}

impl ActionDispatcher {
    /// Dispatcher with a handler for every category.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_handlers(model, &ActionCategory::ALL)
    }

    /// Dispatcher that only serves `categories`; anything else is an unknown action.
    pub fn with_handlers(model: impl Into<String>, categories: &[ActionCategory]) -> Self {
        let mut handlers = categories.to_vec();
        handlers.dedup();
        Self { model: model.into(), handlers }
    }

    pub fn handles(&self, category: ActionCategory) -> bool {
        self.handlers.contains(&category)
    }

    pub fn execute(&self, decision: &Decision) -> ActionResult {
        let start = Instant::now();
        let outcome = self.run(decision.action_type, &decision.parameters);
        let execution_time = start.elapsed().as_secs_f64();

        match outcome {
            Ok(output) => {
                tracing::debug!(action = %decision.action_type, execution_time, "action executed");
                ActionResult {
                    success: true,
                    output,
                    error: None,
                    execution_time,
                    model: self.model.clone(),
                }
            }
            Err(e) => {
                tracing::warn!(action = %decision.action_type, error = %e, "action failed");
                ActionResult {
                    success: false,
                    output: Value::Null,
                    error: Some(e.to_string()),
                    execution_time,
                    model: self.model.clone(),
                }
            }
        }
    }

    fn run(&self, category: ActionCategory, params: &Context) -> Result<Value, AgentError> {
        if !self.handles(category) {
            return Err(AgentError::UnknownAction(category.to_string()));
        }
        let model = str_param(params, "model").unwrap_or(&self.model);
        match category {
            ActionCategory::Respond => Ok(respond(params, model)),
            ActionCategory::Search => Ok(search(params, model)),
            ActionCategory::Calculate => calculate(params, model),
            ActionCategory::Create => Ok(json!({
                "status": format!("[{model}] created"),
                "type": str_param(params, "type").unwrap_or("unknown"),
            })),
            ActionCategory::Modify => Ok(json!({
                "status": format!("[{model}] modified"),
                "id": str_param(params, "id").unwrap_or("unknown"),
            })),
            ActionCategory::Delete => Ok(json!({
                "status": format!("[{model}] deleted"),
                "id": str_param(params, "id").unwrap_or("unknown"),
            })),
        }
    }
}

fn str_param<'a>(params: &'a Context, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn respond(params: &Context, model: &str) -> Value {
    let context = params.get("context").cloned().unwrap_or_else(|| json!({}));
    Value::String(format!("[{model}] Responding to context: {context}"))
}

/// No real search backend; echoes the query.
fn search(params: &Context, model: &str) -> Value {
    let query = str_param(params, "query").unwrap_or("");
    json!({ "results": format!("[{model}] Search results for: {query}") })
}

fn calculate(params: &Context, model: &str) -> Result<Value, AgentError> {
    let value = match params.get("expression") {
        None => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(expr)) => calculator::evaluate(expr)?,
        Some(other) => {
            return Err(AgentError::Validation(format!(
                "expression must be a string or number, got {other}"
            )));
        }
    };
    Ok(json!({ "value": value, "model": model }))
}
