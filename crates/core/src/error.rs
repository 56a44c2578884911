use crate::action::calculator::ExprError;

/// Failures surfaced by the agent pipeline.
///
/// Only the action stage contains its own failures (as a failed
/// `ActionResult`); every other variant aborts the whole `process` call.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Malformed input to a data entity, e.g. importance outside [0, 1].
    #[error("validation error: {0}")]
    Validation(String),
    /// Operation attempted before (or after) the required setup step.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The text-generation collaborator failed; carries its message.
    #[error("error in perception layer: {0}")]
    Perception(String),
    #[error("perception timed out after {0}s")]
    PerceptionTimeout(u64),
    #[error("unknown action type: {0}")]
    UnknownAction(String),
    #[error("expression evaluation failed: {0}")]
    ExpressionEvaluation(#[from] ExprError),
}

/// Startup configuration failures, reported before any request is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("COGITO_API_KEY (or GEMINI_API_KEY) is not set")]
    MissingApiKey,
    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(
            AgentError::UnknownAction("teleport".into()).to_string(),
            "unknown action type: teleport"
        );
        assert_eq!(
            AgentError::Perception("request failed: boom".into()).to_string(),
            "error in perception layer: request failed: boom"
        );
        assert_eq!(AgentError::PerceptionTimeout(30).to_string(), "perception timed out after 30s");
    }

    #[test]
    fn expr_error_converts() {
        let err: AgentError = ExprError::DivisionByZero.into();
        assert!(matches!(err, AgentError::ExpressionEvaluation(ExprError::DivisionByZero)));
    }
}
