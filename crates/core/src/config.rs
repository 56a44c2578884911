use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use cogito_llm::http::HttpProvider;
use cogito_llm::provider::SamplingParams;

use crate::error::ConfigError;

/// Environment variable prefix; `COGITO_RECALL_LIMIT` maps to `recall_limit`.
pub const ENV_PREFIX: &str = "COGITO_";
/// Read when `COGITO_API_KEY` is unset or blank.
pub const FALLBACK_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// All agent parameters. Read from `COGITO_*` environment variables at startup
/// (a `.env` file is honoured); anything unset keeps its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCfg {
    // text-generation backend
    pub model: String,
    /// Model tag that earns the decision engine's fast-model bonus.
    pub fast_model: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub base_url: Option<String>,

    // perception sampling
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub perception_timeout_secs: u64,

    // memory
    pub memory_capacity: usize,
    pub recall_limit: usize,
    pub interaction_importance: f64,
    pub bootstrap_importance: f64,

    // decision
    pub reasoning_chain_cap: usize,
}

impl Default for AgentCfg {
    fn default() -> Self {
        let sampling = SamplingParams::default();
        Self {
            model: "gemini-2.0-flash".into(),
            fast_model: "gemini-2.0-flash".into(),
            api_key: String::new(),
            base_url: None,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            top_k: sampling.top_k,
            max_output_tokens: sampling.max_output_tokens,
            perception_timeout_secs: 30,
            memory_capacity: 1000,
            recall_limit: 5,
            interaction_importance: 0.7,
            bootstrap_importance: 0.9,
            reasoning_chain_cap: 512,
        }
    }
}

impl AgentCfg {
    /// Load from the process environment. Fails if the API key is absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            tracing::warn!(error = %e, "failed to read .env file");
        }

        Self::from_map(&env_map(std::env::vars()))
    }

    /// Build from a field-name → raw value map. Unparseable values fall back
    /// to the default.
    pub fn from_map(m: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let api_key = m.get("api_key").map(|k| k.trim().to_owned()).unwrap_or_default();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let cfg = Self {
            model: get_or(m, "model", d.model),
            fast_model: get_or(m, "fast_model", d.fast_model),
            api_key,
            base_url: m.get("base_url").filter(|u| !u.trim().is_empty()).cloned(),
            temperature: get_or(m, "temperature", d.temperature),
            top_p: get_or(m, "top_p", d.top_p),
            top_k: get_or(m, "top_k", d.top_k),
            max_output_tokens: get_or(m, "max_output_tokens", d.max_output_tokens),
            perception_timeout_secs: get_or(m, "perception_timeout_secs", d.perception_timeout_secs),
            memory_capacity: get_or(m, "memory_capacity", d.memory_capacity),
            recall_limit: get_or(m, "recall_limit", d.recall_limit),
            interaction_importance: get_or(m, "interaction_importance", d.interaction_importance),
            bootstrap_importance: get_or(m, "bootstrap_importance", d.bootstrap_importance),
            reasoning_chain_cap: get_or(m, "reasoning_chain_cap", d.reasoning_chain_cap),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_capacity == 0 {
            return Err(invalid("memory_capacity", "must be at least 1"));
        }
        if self.perception_timeout_secs == 0 {
            return Err(invalid("perception_timeout_secs", "must be at least 1"));
        }
        if self.reasoning_chain_cap == 0 {
            return Err(invalid("reasoning_chain_cap", "must be at least 1"));
        }
        for (key, value) in [
            ("interaction_importance", self.interaction_importance),
            ("bootstrap_importance", self.bootstrap_importance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(key, format!("{value} is outside [0, 1]")));
            }
        }
        Ok(())
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_output_tokens: self.max_output_tokens,
        }
    }

    pub fn perception_timeout(&self) -> Duration {
        Duration::from_secs(self.perception_timeout_secs)
    }

    /// HTTP provider for the configured model.
    pub fn http_provider(&self) -> HttpProvider {
        HttpProvider::new(self.model.clone(), self.api_key.clone(), self.base_url.clone())
    }
}

/// Field map from `COGITO_*` variables, with the API key falling back to
/// `GEMINI_API_KEY`.
fn env_map(vars: impl IntoIterator<Item = (String, String)>) -> HashMap<String, String> {
    let mut fallback_key = None;
    let mut map: HashMap<String, String> = HashMap::new();
    for (k, v) in vars {
        if k == FALLBACK_API_KEY_VAR {
            fallback_key = Some(v);
        } else if let Some(field) = k.strip_prefix(ENV_PREFIX) {
            map.insert(field.to_lowercase(), v);
        }
    }
    let has_key = map.get("api_key").is_some_and(|k| !k.trim().is_empty());
    if !has_key && let Some(key) = fallback_key {
        map.insert("api_key".into(), key);
    }
    map
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { key, reason: reason.into() }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    match map.get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparseable config value, using default");
            default
        }),
        None => default,
    }
}
