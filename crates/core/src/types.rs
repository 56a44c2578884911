use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AgentError;

/// String-keyed bag of JSON values passed between stages.
pub type Context = serde_json::Map<String, serde_json::Value>;

// ── Session ─────────────────────────────────────────────────────

/// Who the user is. Set once per session; read by perception and decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub likes: Vec<String>,
    pub location: String,
    pub favorite_topics: Vec<String>,
    #[serde(default)]
    pub additional_context: Context,
}

impl UserPreferences {
    pub fn new(
        likes: impl IntoIterator<Item = impl Into<String>>,
        location: impl Into<String>,
        favorite_topics: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            likes: likes.into_iter().map(Into::into).collect(),
            location: location.into(),
            favorite_topics: favorite_topics.into_iter().map(Into::into).collect(),
            additional_context: Context::new(),
        }
    }

    /// Split a comma-separated answer into trimmed, non-empty tags.
    pub fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

// ── Memory ──────────────────────────────────────────────────────

/// One remembered interaction. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: Uuid,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Context,
    /// Priority in [0, 1]; primary eviction and ranking key.
    pub importance: f64,
}

impl MemoryEntry {
    pub const DEFAULT_IMPORTANCE: f64 = 0.5;

    /// Validates `importance` and stamps the entry with the current time.
    pub fn new(content: impl Into<String>, metadata: Context, importance: f64) -> Result<Self, AgentError> {
        if !(0.0..=1.0).contains(&importance) {
            return Err(AgentError::Validation(format!(
                "importance must be within [0, 1], got {importance}"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
            importance,
        })
    }

    /// Ranking order: higher importance first, newer first among equals.
    pub fn rank_cmp(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.importance
            .total_cmp(&a.importance)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    }
}

/// Result of a memory recall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecall {
    pub relevant_memories: Vec<MemoryEntry>,
    pub context_summary: String,
    pub confidence: f64,
}

// ── Perception ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionResult {
    pub processed_input: String,
    pub context: Context,
    pub confidence: f64,
}

// ── Decision ────────────────────────────────────────────────────

/// Closed set of things the agent can do in one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Respond,
    Search,
    Calculate,
    Create,
    Modify,
    Delete,
}

impl ActionCategory {
    /// Every category, in tie-break order.
    pub const ALL: [ActionCategory; 6] = [
        Self::Respond,
        Self::Search,
        Self::Calculate,
        Self::Create,
        Self::Modify,
        Self::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Respond => "respond",
            Self::Search => "search",
            Self::Calculate => "calculate",
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionCategory {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AgentError::UnknownAction(s.to_owned()))
    }
}

/// One scored candidate action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action_type: ActionCategory,
    pub parameters: Context,
    pub confidence: f64,
    pub reasoning: String,
    pub model: String,
}

/// Everything one `evaluate` call produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub decisions: Vec<Decision>,
    pub final_action: Decision,
    pub reasoning_chain: Vec<String>,
    pub model: String,
}

// ── Action ──────────────────────────────────────────────────────

/// Uniform envelope for a handler run, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub output: serde_json::Value,
    pub error: Option<String>,
    /// Seconds spent inside the dispatcher, measured on failure too.
    pub execution_time: f64,
    pub model: String,
}

// ── Pipeline ────────────────────────────────────────────────────

/// Terminal artifact of one pipeline pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub output: serde_json::Value,
    pub confidence: f64,
    pub reasoning_chain: Vec<String>,
    /// Total wall-clock seconds for the pass.
    pub execution_time: f64,
    pub model_used: String,
    /// Set when the action stage failed; `output` is then null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_error: Option<String>,
}

impl AgentResponse {
    /// Output rendered for display: strings verbatim, everything else as JSON.
    pub fn output_text(&self) -> String {
        match &self.output {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}
