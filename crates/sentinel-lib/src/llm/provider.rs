//! Provider configuration and request/response types

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Wire protocol family a provider speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderProtocol {
    /// Completion-style local server: `{prompt, max_tokens, temperature,
    /// stream}` in, a top-level `content`/`response` string out
    LocalCompletion,
    /// Chat completions: `messages` in, `choices[0].message.content` out,
    /// bearer auth
    OpenAiChat,
    /// Messages API: `messages` in, `content[0].text` out, x-api-key auth
    AnthropicMessages,
}

/// Configuration record for one LLM backend.
///
/// Immutable after registration. The API key is injected configuration;
/// its absence only fails requests routed to this provider, never
/// registration itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProvider {
    pub name: String,
    pub protocol: ProviderProtocol,
    pub model: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Task types this provider handles; `"all"` is a wildcard
    pub task_affinities: Vec<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
}

impl LlmProvider {
    /// Whether this provider declares affinity for a task type
    pub fn supports_task(&self, task_type: &str) -> bool {
        self.task_affinities
            .iter()
            .any(|t| t == task_type || t == "all")
    }
}

/// A generic request routed to some provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    pub task_type: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, String>>,
    /// Zero means "use the provider's configured limit"
    pub max_tokens: u32,
    /// Zero means "use the provider's configured temperature"
    pub temperature: f64,
    pub urgent: bool,
}

/// A successful provider response in generic shape
#[derive(Debug, Clone, Serialize)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    /// Total wall-clock time spent routing, including fallback attempts
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(affinities: &[&str]) -> LlmProvider {
        LlmProvider {
            name: "test".to_string(),
            protocol: ProviderProtocol::LocalCompletion,
            model: "test-model".to_string(),
            endpoint: "http://localhost:8000/completion".to_string(),
            api_key: None,
            task_affinities: affinities.iter().map(|s| s.to_string()).collect(),
            max_tokens: 500,
            temperature: 0.3,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_supports_declared_task() {
        let p = provider(&["prediction", "quick_analysis"]);
        assert!(p.supports_task("prediction"));
        assert!(!p.supports_task("script_generation"));
    }

    #[test]
    fn test_wildcard_affinity_matches_everything() {
        let p = provider(&["all"]);
        assert!(p.supports_task("prediction"));
        assert!(p.supports_task("anything_else"));
    }
}
