//! Agent configuration
//!
//! All values come from the environment with a `SENTINEL_` prefix; API keys
//! and endpoints are injected configuration, never discovered at runtime.

use anyhow::Result;
use serde::Deserialize;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SentinelConfig {
    /// Host name reported in structured logs
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// API server port for health/metrics/status
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Telemetry sampling interval in seconds
    #[serde(default = "default_collect_interval")]
    pub collect_interval_secs: u64,

    /// Whether to generate predictions when patterns are active
    #[serde(default = "default_prediction_enabled")]
    pub prediction_enabled: bool,

    /// Optional dashboard endpoint for the export side channel
    #[serde(default)]
    pub dashboard_url: Option<String>,

    /// Completion-style local LLM endpoint
    #[serde(default = "default_local_endpoint")]
    pub local_llm_endpoint: String,

    /// Model name reported for the local provider
    #[serde(default = "default_local_model")]
    pub local_llm_model: String,

    /// Anthropic-style cloud API key (provider skipped when unset)
    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    /// OpenAI-style cloud API key (provider skipped when unset)
    #[serde(default)]
    pub openai_api_key: Option<String>,
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8081
}

fn default_collect_interval() -> u64 {
    5
}

fn default_prediction_enabled() -> bool {
    true
}

fn default_local_endpoint() -> String {
    "http://localhost:11434/api/generate".to_string()
}

fn default_local_model() -> String {
    "llama3.2:1b".to_string()
}

impl SentinelConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("SENTINEL"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| SentinelConfig {
            host_name: default_host_name(),
            api_port: default_api_port(),
            collect_interval_secs: default_collect_interval(),
            prediction_enabled: default_prediction_enabled(),
            dashboard_url: None,
            local_llm_endpoint: default_local_endpoint(),
            local_llm_model: default_local_model(),
            anthropic_api_key: None,
            openai_api_key: None,
        }))
    }
}
