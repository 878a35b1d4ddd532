//! LLM Transport Abstraction
//!
//! Defines the `ChatTransport` trait: one chat-completion round trip, with
//! failures already classified into [`LlmError`] so the retry loop can decide
//! whether another attempt is worthwhile.

mod openai;

pub use openai::OpenAiTransport;

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::types::Result;

// =============================================================================
// Request / Response
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u64,
    pub temperature: f32,
}

/// Token counts reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Raw completion text plus whatever metadata the service returned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Option<ProviderUsage>,
    pub model: Option<String>,
}

impl ChatCompletion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// One request/response exchange with a chat completion service
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> std::result::Result<ChatCompletion, LlmError>;

    /// Transport name for logging
    fn name(&self) -> &str;
}

pub type SharedTransport = Arc<dyn ChatTransport>;

/// Create the HTTP transport from LLM configuration
pub fn create_transport(config: &LlmConfig) -> Result<SharedTransport> {
    Ok(Arc::new(OpenAiTransport::new(config)?))
}
