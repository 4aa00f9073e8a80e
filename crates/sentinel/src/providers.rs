//! Default provider set and routing rules
//!
//! Mirrors the intended deployment: a fast completion-style local model for
//! urgent and routine work, with chat-style cloud providers registered only
//! when their API keys are injected. The fallback chain prefers local
//! before cloud.

use std::time::Duration;

use sentinel_lib::llm::{LlmProvider, LlmRouter, ProviderProtocol, RoutingRule};
use tracing::info;

use crate::config::SentinelConfig;

/// Build the router with the default provider/rule/fallback arrangement
pub fn build_router(config: &SentinelConfig) -> LlmRouter {
    let mut router = LlmRouter::new();
    let mut chain = Vec::new();

    router.add_provider(LlmProvider {
        name: "fast_local".to_string(),
        protocol: ProviderProtocol::LocalCompletion,
        model: config.local_llm_model.clone(),
        endpoint: config.local_llm_endpoint.clone(),
        api_key: None,
        task_affinities: vec![
            "simple_decisions".to_string(),
            "pattern_matching".to_string(),
            "quick_analysis".to_string(),
            "prediction".to_string(),
        ],
        max_tokens: 1000,
        temperature: 0.3,
        timeout: Duration::from_secs(5),
    });
    chain.push("fast_local".to_string());

    if config.anthropic_api_key.is_some() {
        router.add_provider(LlmProvider {
            name: "smart_cloud".to_string(),
            protocol: ProviderProtocol::AnthropicMessages,
            model: "claude-3-5-sonnet-20241022".to_string(),
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: config.anthropic_api_key.clone(),
            task_affinities: vec![
                "theory_generation".to_string(),
                "complex_reasoning".to_string(),
                "novel_problems".to_string(),
                "prediction".to_string(),
            ],
            max_tokens: 4000,
            temperature: 0.7,
            timeout: Duration::from_secs(30),
        });
        chain.push("smart_cloud".to_string());
    } else {
        info!("No Anthropic API key configured, skipping smart_cloud provider");
    }

    if config.openai_api_key.is_some() {
        router.add_provider(LlmProvider {
            name: "code_generator".to_string(),
            protocol: ProviderProtocol::OpenAiChat,
            model: "gpt-4".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: config.openai_api_key.clone(),
            task_affinities: vec![
                "script_generation".to_string(),
                "code_optimization".to_string(),
                "debugging".to_string(),
            ],
            max_tokens: 2000,
            temperature: 0.2,
            timeout: Duration::from_secs(20),
        });
        chain.push("code_generator".to_string());
    } else {
        info!("No OpenAI API key configured, skipping code_generator provider");
    }

    router.add_rule(RoutingRule::new(
        1,
        "urgent == true",
        "fast_local",
        "Local model for urgent requests",
    ));
    router.add_rule(RoutingRule::new(
        2,
        "task_type == prediction",
        "fast_local",
        "Local model for routine predictions",
    ));
    router.add_rule(RoutingRule::new(
        3,
        "task_type == complex_reasoning",
        "smart_cloud",
        "Cloud model for complex reasoning",
    ));
    router.add_rule(RoutingRule::new(
        3,
        "task_type == script_generation",
        "code_generator",
        "Cloud model for code generation",
    ));
    router.add_rule(RoutingRule::new(
        4,
        "task_type == pattern_matching",
        "fast_local",
        "Local model for pattern matching",
    ));

    router.set_fallback_chain(chain);
    router
}
