//! OpenAI-compatible Chat Completions Transport
//!
//! POSTs `{model, messages, max_tokens, temperature}` to `<api_base>/chat/completions`
//! and returns `choices[0].message.content` with reported usage.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ChatCompletion, ChatRequest, ChatTransport, ProviderUsage};
use crate::config::LlmConfig;
use crate::constants::network as net_constants;
use crate::types::{ErrorCategory, ErrorClassifier, LlmError, Result, ReviewError};

const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// HTTP transport with secure API key handling
pub struct OpenAiTransport {
    /// Never exposed in logs or debug output
    api_key: SecretString,
    endpoint: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiTransport")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl OpenAiTransport {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ReviewError::Config(format!(
                    "API key not found. Set {} or llm.api_key in config",
                    API_KEY_ENV
                ))
            })?;

        Self::with_key(&config.api_base, SecretString::from(api_key))
    }

    pub fn with_key(api_base: &str, api_key: SecretString) -> Result<Self> {
        // Request timeouts are owned by the attempt loop
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(net_constants::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| ReviewError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            endpoint: Self::endpoint(api_base),
            client,
        })
    }

    fn endpoint(api_base: &str) -> String {
        format!("{}/chat/completions", api_base.trim_end_matches('/'))
    }

    fn parse_completion(body: ChatCompletionResponse) -> std::result::Result<ChatCompletion, LlmError> {
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::transient("No content in completion response"))?;

        Ok(ChatCompletion {
            content,
            usage: body.usage.map(|u| ProviderUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
            model: body.model,
        })
    }
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    async fn send(&self, request: &ChatRequest) -> std::result::Result<ChatCompletion, LlmError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(status.as_u16(), &body));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|e| {
            LlmError::new(
                ErrorCategory::Transient,
                format!("Failed to decode completion envelope: {}", e),
            )
        })?;

        Self::parse_completion(body)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// Response types

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u64,
    completion_tokens: u64,
}
