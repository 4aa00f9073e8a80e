//! Protocol-specific provider adapters
//!
//! Each adapter builds the provider's wire format, POSTs with a timeout
//! taken from the provider configuration, and parses the success shape
//! into the generic [`LlmResponse`]. Response parsing goes through typed
//! structs with an explicit attempt order, never dynamic field probing.

use std::time::Instant;

use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{LlmError, LlmProvider, LlmRequest, LlmResponse, ProviderProtocol};

/// Anthropic-style API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Invoke a provider with the protocol adapter matching its configuration
pub(crate) async fn call_provider(
    http: &reqwest::Client,
    provider: &LlmProvider,
    request: &LlmRequest,
) -> Result<LlmResponse, LlmError> {
    match provider.protocol {
        ProviderProtocol::LocalCompletion => call_completion(http, provider, request).await,
        ProviderProtocol::OpenAiChat => call_openai_chat(http, provider, request).await,
        ProviderProtocol::AnthropicMessages => {
            call_anthropic_messages(http, provider, request).await
        }
    }
}

fn effective_max_tokens(provider: &LlmProvider, request: &LlmRequest) -> u32 {
    if request.max_tokens > 0 {
        request.max_tokens
    } else {
        provider.max_tokens
    }
}

fn effective_temperature(provider: &LlmProvider, request: &LlmRequest) -> f64 {
    if request.temperature > 0.0 {
        request.temperature
    } else {
        provider.temperature
    }
}

/// POST a JSON body and return the successful response, mapping transport
/// failures and non-2xx statuses to typed errors
async fn post_json(
    http: &reqwest::Client,
    provider: &LlmProvider,
    headers: &[(&str, String)],
    body: serde_json::Value,
) -> Result<reqwest::Response, LlmError> {
    let url = Url::parse(&provider.endpoint).map_err(|source| LlmError::Endpoint {
        provider: provider.name.clone(),
        source,
    })?;

    let mut builder = http.post(url).timeout(provider.timeout).json(&body);
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }

    let response = builder.send().await.map_err(|source| LlmError::Http {
        provider: provider.name.clone(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            provider: provider.name.clone(),
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}

fn api_key<'a>(provider: &'a LlmProvider) -> Result<&'a str, LlmError> {
    provider
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| LlmError::MissingApiKey(provider.name.clone()))
}

/// Completion-style response: `content` (llama.cpp) or `response` (ollama)
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: Option<String>,
    response: Option<String>,
}

async fn call_completion(
    http: &reqwest::Client,
    provider: &LlmProvider,
    request: &LlmRequest,
) -> Result<LlmResponse, LlmError> {
    let start = Instant::now();

    let body = json!({
        "prompt": request.prompt,
        "max_tokens": effective_max_tokens(provider, request),
        "temperature": effective_temperature(provider, request),
        "stream": false,
    });

    let response = post_json(http, provider, &[], body).await?;
    let parsed: CompletionResponse =
        response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse {
                provider: provider.name.clone(),
                reason: e.to_string(),
            })?;

    // Try `content` first, then `response`
    let content = parsed
        .content
        .or(parsed.response)
        .ok_or_else(|| LlmError::MalformedResponse {
            provider: provider.name.clone(),
            reason: "no content or response field".to_string(),
        })?;

    // Local servers occasionally echo chat template tokens
    let content = content.trim();
    let content = content.strip_prefix("<|assistant|>").unwrap_or(content);

    Ok(LlmResponse {
        content: content.trim().to_string(),
        provider: provider.name.clone(),
        model: provider.model.clone(),
        duration: start.elapsed(),
        tokens_used: None,
        cost: None,
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    completion_tokens: Option<u32>,
}

async fn call_openai_chat(
    http: &reqwest::Client,
    provider: &LlmProvider,
    request: &LlmRequest,
) -> Result<LlmResponse, LlmError> {
    let start = Instant::now();
    let key = api_key(provider)?;

    let body = json!({
        "model": provider.model,
        "max_tokens": effective_max_tokens(provider, request),
        "messages": [{"role": "user", "content": request.prompt}],
        "temperature": effective_temperature(provider, request),
    });

    let headers = [("Authorization", format!("Bearer {}", key))];
    let response = post_json(http, provider, &headers, body).await?;
    let parsed: ChatCompletionsResponse =
        response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse {
                provider: provider.name.clone(),
                reason: e.to_string(),
            })?;

    let content = parsed
        .choices
        .first()
        .and_then(|c| c.message.content.clone())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LlmError::MalformedResponse {
            provider: provider.name.clone(),
            reason: "no message content in first choice".to_string(),
        })?;

    Ok(LlmResponse {
        content,
        provider: provider.name.clone(),
        model: provider.model.clone(),
        duration: start.elapsed(),
        tokens_used: parsed.usage.and_then(|u| u.completion_tokens),
        cost: None,
    })
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    output_tokens: Option<u32>,
}

async fn call_anthropic_messages(
    http: &reqwest::Client,
    provider: &LlmProvider,
    request: &LlmRequest,
) -> Result<LlmResponse, LlmError> {
    let start = Instant::now();
    let key = api_key(provider)?;

    let body = json!({
        "model": provider.model,
        "max_tokens": effective_max_tokens(provider, request),
        "messages": [{"role": "user", "content": request.prompt}],
        "temperature": effective_temperature(provider, request),
    });

    let headers = [
        ("x-api-key", key.to_string()),
        ("anthropic-version", ANTHROPIC_VERSION.to_string()),
    ];
    let response = post_json(http, provider, &headers, body).await?;
    let parsed: MessagesResponse =
        response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse {
                provider: provider.name.clone(),
                reason: e.to_string(),
            })?;

    let content = parsed
        .content
        .first()
        .and_then(|b| b.text.clone())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| LlmError::MalformedResponse {
            provider: provider.name.clone(),
            reason: "no text in first content block".to_string(),
        })?;

    Ok(LlmResponse {
        content,
        provider: provider.name.clone(),
        model: provider.model.clone(),
        duration: start.elapsed(),
        tokens_used: parsed.usage.and_then(|u| u.output_tokens),
        cost: None,
    })
}
