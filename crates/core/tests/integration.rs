//! Pipeline scenarios driven through the public orchestrator API with
//! in-process providers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cogito_core::config::AgentCfg;
use cogito_core::error::AgentError;
use cogito_core::runtime::Orchestrator;
use cogito_core::types::UserPreferences;
use cogito_llm::provider::{FailingProvider, LlmProvider, MockProvider};

fn cfg_with(pairs: &[(&str, &str)]) -> Arc<AgentCfg> {
    let mut map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    map.entry("api_key".into()).or_insert_with(|| "test-key".into());
    Arc::new(AgentCfg::from_map(&map).expect("valid config"))
}

fn prefs() -> UserPreferences {
    UserPreferences::new(["chess"], "NYC", ["ai"])
}

fn agent(provider: Arc<dyn LlmProvider>) -> Orchestrator {
    Orchestrator::new(cfg_with(&[]), provider)
}

#[tokio::test]
async fn process_before_preferences_is_invalid_state() {
    let mut o = agent(Arc::new(MockProvider::new("ok")));
    let err = o.process("hello").await.unwrap_err();
    assert!(matches!(err, AgentError::InvalidState(_)));
    assert!(o.preferences().is_none());
}

#[tokio::test]
async fn what_time_is_it() {
    let mock = Arc::new(MockProvider::new("The user in NYC asks for the time."));
    let mut o = agent(mock.clone());
    o.set_preferences(prefs()).unwrap();

    let resp = o.process("what time is it").await.unwrap();
    assert!((0.0..=1.0).contains(&resp.confidence));
    assert!((resp.confidence - 0.9).abs() < 1e-9);
    assert!(!resp.reasoning_chain.is_empty());
    assert!(resp.execution_time >= 0.0);
    assert_eq!(resp.model_used, "gemini-2.0-flash");

    // the prompt carried the user's context
    let prompt = &mock.last_request().unwrap().messages[0].content;
    assert!(prompt.contains("NYC"));
    assert!(prompt.contains("chess"));
    assert!(prompt.contains("what time is it"));
}

#[tokio::test]
async fn memory_records_bootstrap_and_interactions() {
    let mut o = agent(Arc::new(MockProvider::new("noted")));
    o.set_preferences(prefs()).unwrap();
    o.process("one").await.unwrap();
    o.process("two").await.unwrap();

    let entries = o.memory().entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].importance, 0.9);
    assert!(entries[0].content.starts_with("User preferences initialized with"));
    assert!(entries[1..].iter().all(|e| e.importance == 0.7 && e.content == "noted"));
    assert!(entries[1].timestamp < entries[2].timestamp);
}

#[tokio::test]
async fn reasoning_chain_grows_across_requests() {
    let mut o = agent(Arc::new(MockProvider::new("ok")));
    o.set_preferences(prefs()).unwrap();
    let first = o.process("a").await.unwrap();
    let second = o.process("b").await.unwrap();
    assert_eq!(first.reasoning_chain.len(), 6);
    assert_eq!(second.reasoning_chain.len(), 12);
    assert!(second.reasoning_chain[0].starts_with("[gemini-2.0-flash] Evaluated respond:"));
}

#[tokio::test]
async fn reasoning_chain_respects_configured_cap() {
    let cfg = cfg_with(&[("reasoning_chain_cap", "8")]);
    let mut o = Orchestrator::new(cfg, Arc::new(MockProvider::new("ok")));
    o.set_preferences(prefs()).unwrap();
    for _ in 0..3 {
        o.process("again").await.unwrap();
    }
    let resp = o.process("last").await.unwrap();
    assert_eq!(resp.reasoning_chain.len(), 8);
}

#[tokio::test]
async fn perception_failure_aborts_the_pass() {
    let mut o = agent(Arc::new(FailingProvider::new("service unavailable")));
    o.set_preferences(prefs()).unwrap();
    match o.process("hello").await.unwrap_err() {
        AgentError::Perception(msg) => assert!(msg.contains("service unavailable")),
        other => panic!("unexpected error: {other:?}"),
    }
    // only the bootstrap entry
    assert_eq!(o.memory().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_provider_hits_configured_timeout() {
    let cfg = cfg_with(&[("perception_timeout_secs", "3")]);
    let slow = Arc::new(MockProvider::with_delay("late", Duration::from_secs(10)));
    let mut o = Orchestrator::new(cfg, slow);
    o.set_preferences(prefs()).unwrap();
    let err = o.process("hello").await.unwrap_err();
    assert!(matches!(err, AgentError::PerceptionTimeout(3)));
}

#[tokio::test]
async fn memory_stays_bounded() {
    let cfg = cfg_with(&[("memory_capacity", "3")]);
    let mut o = Orchestrator::new(cfg, Arc::new(MockProvider::new("x")));
    o.set_preferences(prefs()).unwrap();
    for _ in 0..5 {
        o.process("again").await.unwrap();
    }
    assert_eq!(o.memory().len(), 3);
    // the bootstrap entry outranks every interaction
    assert!(o.memory().entries().iter().any(|e| e.importance == 0.9));
}

#[tokio::test]
async fn recall_limit_zero_still_processes() {
    let cfg = cfg_with(&[("recall_limit", "0")]);
    let mut o = Orchestrator::new(cfg, Arc::new(MockProvider::new("ok")));
    o.set_preferences(prefs()).unwrap();
    let resp = o.process("hi").await.unwrap();
    assert!(resp.action_error.is_none());
}

#[tokio::test]
async fn model_tag_comes_from_config() {
    let cfg = cfg_with(&[("model", "claude-test"), ("fast_model", "gemini-2.0-flash")]);
    let mut o = Orchestrator::new(cfg, Arc::new(MockProvider::new("ok")));
    assert_eq!(o.model(), "claude-test");
    o.set_preferences(prefs()).unwrap();
    let resp = o.process("hi").await.unwrap();
    assert_eq!(resp.model_used, "claude-test");
    // no fast-model bonus
    assert!((resp.confidence - 0.8).abs() < 1e-9);
    assert!(resp.output_text().starts_with("[claude-test]"));
}

#[test]
fn preferences_cannot_be_replaced() {
    let mut o = agent(Arc::new(MockProvider::new("ok")));
    o.set_preferences(prefs()).unwrap();
    let err = o
        .set_preferences(UserPreferences::new(["go"], "LA", ["music"]))
        .unwrap_err();
    assert!(matches!(err, AgentError::InvalidState(_)));
    assert_eq!(o.preferences().map(|p| p.location.as_str()), Some("NYC"));
}

#[test]
fn missing_api_key_is_a_startup_error() {
    let err = AgentCfg::from_map(&HashMap::new()).unwrap_err();
    assert_eq!(err.to_string(), "COGITO_API_KEY (or GEMINI_API_KEY) is not set");
}
