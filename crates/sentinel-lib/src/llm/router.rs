//! Provider registry and rule-driven request routing
//!
//! Routing is deterministic: rules are evaluated in ascending priority
//! order, the first matching rule whose provider declares the request's
//! task type wins, and failures walk the configured fallback chain in
//! order. Only exhaustion of the chain surfaces an error.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::adapters::call_provider;
use super::{LlmError, LlmProvider, LlmRequest, LlmResponse, RoutingRule};
use crate::observability::SentinelMetrics;

/// Rolling request/response log capacity
const LOG_CAPACITY: usize = 100;

/// Routes requests to providers by rule, with ordered fallback
pub struct LlmRouter {
    providers: HashMap<String, LlmProvider>,
    rules: Vec<RoutingRule>,
    fallback_chain: Vec<String>,
    http: reqwest::Client,
    metrics: SentinelMetrics,
    request_log: Mutex<VecDeque<LlmRequest>>,
    response_log: Mutex<VecDeque<LlmResponse>>,
}

impl LlmRouter {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            rules: Vec::new(),
            fallback_chain: Vec::new(),
            http: reqwest::Client::new(),
            metrics: SentinelMetrics::new(),
            request_log: Mutex::new(VecDeque::new()),
            response_log: Mutex::new(VecDeque::new()),
        }
    }

    /// Register a provider; duplicate names overwrite the previous entry
    pub fn add_provider(&mut self, provider: LlmProvider) {
        debug!(
            provider = %provider.name,
            model = %provider.model,
            "Registered LLM provider"
        );
        self.providers.insert(provider.name.clone(), provider);
    }

    pub fn remove_provider(&mut self, name: &str) {
        self.providers.remove(name);
    }

    pub fn provider(&self, name: &str) -> Option<&LlmProvider> {
        self.providers.get(name)
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Add a routing rule; rules are kept sorted by ascending priority,
    /// insertion order breaking ties
    pub fn add_rule(&mut self, rule: RoutingRule) {
        self.rules.push(rule);
        self.rules.sort_by_key(|r| r.priority);
    }

    /// Providers tried in order when the selected one fails
    pub fn set_fallback_chain(&mut self, chain: Vec<String>) {
        self.fallback_chain = chain;
    }

    /// Route a request to the best provider and return its response.
    ///
    /// The request and any successful response land in the rolling logs
    /// regardless of which provider ultimately served it. On failure the
    /// fallback chain is walked in order (skipping the provider that just
    /// failed); the last error is returned if the chain is exhausted.
    pub async fn route_request(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();

        self.metrics.inc_llm_requests();
        push_capped(&self.request_log, request.clone());

        let selected = self
            .select_provider(&request)
            .ok_or_else(|| LlmError::NoProvider(request.task_type.clone()))?
            .to_string();
        let provider = self
            .providers
            .get(&selected)
            .ok_or_else(|| LlmError::UnknownProvider(selected.clone()))?;

        info!(
            task_type = %request.task_type,
            provider = %provider.name,
            model = %provider.model,
            "Routing LLM request"
        );

        let mut result = call_provider(&self.http, provider, &request).await;

        if let Err(ref first_error) = result {
            warn!(
                provider = %selected,
                error = %first_error,
                "Provider failed, trying fallback chain"
            );
            self.metrics.inc_llm_fallbacks();

            for fallback_name in &self.fallback_chain {
                if *fallback_name == selected {
                    continue;
                }
                let Some(fallback) = self.providers.get(fallback_name) else {
                    continue;
                };

                info!(provider = %fallback_name, "Falling back");
                match call_provider(&self.http, fallback, &request).await {
                    Ok(response) => {
                        result = Ok(response);
                        break;
                    }
                    Err(e) => {
                        warn!(provider = %fallback_name, error = %e, "Fallback provider failed");
                        result = Err(e);
                    }
                }
            }
        }

        let mut response = result?;
        response.duration = start.elapsed();
        self.metrics
            .observe_llm_latency(response.duration.as_secs_f64());
        push_capped(&self.response_log, response.clone());

        Ok(response)
    }

    /// Pick a provider name for the request.
    ///
    /// First matching rule whose provider declares the task type wins;
    /// with no match the head of the fallback chain is used.
    fn select_provider(&self, request: &LlmRequest) -> Option<&str> {
        for rule in &self.rules {
            if !rule.condition.matches(request) {
                continue;
            }
            if let Some(provider) = self.providers.get(&rule.provider) {
                if provider.supports_task(&request.task_type) {
                    return Some(rule.provider.as_str());
                }
            }
        }

        self.fallback_chain.first().map(|s| s.as_str())
    }

    /// Usage statistics aggregated from the response log
    pub fn stats(&self) -> RouterStats {
        let responses = self.response_log.lock().expect("response log poisoned");

        let mut usage: HashMap<String, ProviderUsage> = HashMap::new();
        for response in responses.iter() {
            let entry = usage.entry(response.provider.clone()).or_default();
            entry.requests += 1;
            entry.total_duration += response.duration;
        }

        RouterStats {
            total_requests: responses.len(),
            providers_registered: self.providers.len(),
            usage,
        }
    }

    /// Current request/response log sizes
    pub fn log_sizes(&self) -> (usize, usize) {
        let requests = self.request_log.lock().expect("request log poisoned").len();
        let responses = self
            .response_log
            .lock()
            .expect("response log poisoned")
            .len();
        (requests, responses)
    }
}

impl Default for LlmRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Append to a rolling log, evicting the oldest entries beyond capacity
fn push_capped<T>(log: &Mutex<VecDeque<T>>, item: T) {
    let mut log = log.lock().expect("log poisoned");
    log.push_back(item);
    while log.len() > LOG_CAPACITY {
        log.pop_front();
    }
}

/// Per-provider usage counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderUsage {
    pub requests: usize,
    pub total_duration: Duration,
}

impl ProviderUsage {
    pub fn avg_duration(&self) -> Duration {
        if self.requests == 0 {
            return Duration::ZERO;
        }
        self.total_duration / self.requests as u32
    }
}

/// Router statistics for the status surface
#[derive(Debug, Clone, Serialize)]
pub struct RouterStats {
    pub total_requests: usize,
    pub providers_registered: usize,
    pub usage: HashMap<String, ProviderUsage>,
}
