//! Multi-provider LLM routing
//!
//! This module provides:
//! - A name-keyed registry of provider configurations
//! - Priority-ordered routing rules with task-affinity checks
//! - Per-protocol HTTP adapters (completion and two chat wire shapes)
//! - An ordered fallback chain tried when the selected provider fails

mod adapters;
mod provider;
mod router;
mod rules;

pub use provider::{LlmProvider, LlmRequest, LlmResponse, ProviderProtocol};
pub use router::{LlmRouter, ProviderUsage, RouterStats};
pub use rules::{RoutingRule, RuleCondition};

use thiserror::Error;

/// Errors surfaced by the routing layer.
///
/// A single provider failure is handled internally via the fallback chain;
/// callers only see the last error once the chain is exhausted.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no provider available for task type '{0}'")]
    NoProvider(String),

    #[error("provider '{0}' is not registered")]
    UnknownProvider(String),

    #[error("API key not configured for provider '{0}'")]
    MissingApiKey(String),

    #[error("invalid endpoint for provider '{provider}'")]
    Endpoint {
        provider: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to provider '{provider}' failed")]
    Http {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("provider '{provider}' returned status {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("malformed response from provider '{provider}': {reason}")]
    MalformedResponse { provider: String, reason: String },
}
