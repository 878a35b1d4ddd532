//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! These are the loosely-typed serde layer; runtime components convert them into
//! validated values (`Budget`, `RetryPolicy`, `RateLimiter`) at construction time.

use serde::{Deserialize, Serialize};

use crate::constants::{budget, network, rate_limit, response, retry, tokens};
use crate::types::{Result, ReviewError};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM service settings
    pub llm: LlmConfig,

    /// Request token and size budget
    pub budget: BudgetConfig,

    /// Retry and backoff settings
    pub retry: RetryConfig,

    /// Client-side rate limit window
    pub rate_limit: RateLimitConfig,

    /// File discovery and filtering
    pub scan: ScanConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            budget: BudgetConfig::default(),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `ReviewError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        self.llm.validate()?;
        self.budget.validate()?;
        self.retry.validate()?;
        self.rate_limit.validate()?;
        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat completions API
    pub api_base: String,

    /// Model name
    pub model: String,

    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,

    /// API key. Never serialized; falls back to `OPENAI_API_KEY`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: network::DEFAULT_API_BASE.to_string(),
            model: network::DEFAULT_MODEL.to_string(),
            temperature: response::DEFAULT_TEMPERATURE,
            api_key: None,
        }
    }
}

impl LlmConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ReviewError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        url::Url::parse(&self.api_base).map_err(|e| {
            ReviewError::Config(format!("Invalid llm.api_base '{}': {}", self.api_base, e))
        })?;
        if self.model.trim().is_empty() {
            return Err(ReviewError::Config("llm.model must not be empty".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// Budget Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Context ceiling for one request
    pub max_tokens: u64,
    /// Tokens held back for the response
    pub reserved_tokens: u64,
    pub max_file_size_bytes: u64,
    pub max_total_size_bytes: u64,
    /// Estimated tokens per character of content
    pub tokens_per_char: f64,
    /// USD per 1K tokens
    pub price_per_k_tokens: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: budget::DEFAULT_MAX_TOKENS,
            reserved_tokens: budget::DEFAULT_RESERVED_TOKENS,
            max_file_size_bytes: budget::DEFAULT_MAX_FILE_SIZE_BYTES,
            max_total_size_bytes: budget::DEFAULT_MAX_TOTAL_SIZE_BYTES,
            tokens_per_char: tokens::DEFAULT_TOKENS_PER_CHAR,
            price_per_k_tokens: tokens::DEFAULT_PRICE_PER_K_TOKENS,
        }
    }
}

impl BudgetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(ReviewError::Config(
                "budget.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.reserved_tokens >= self.max_tokens {
            return Err(ReviewError::Config(format!(
                "budget.reserved_tokens ({}) must be less than budget.max_tokens ({})",
                self.reserved_tokens, self.max_tokens
            )));
        }
        if !(self.tokens_per_char.is_finite() && self.tokens_per_char > 0.0) {
            return Err(ReviewError::Config(format!(
                "budget.tokens_per_char must be a positive number, got {}",
                self.tokens_per_char
            )));
        }
        if !(self.price_per_k_tokens.is_finite() && self.price_per_k_tokens >= 0.0) {
            return Err(ReviewError::Config(format!(
                "budget.price_per_k_tokens must be non-negative, got {}",
                self.price_per_k_tokens
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the second attempt (milliseconds)
    pub retry_delay_ms: u64,
    /// Multiplier applied to each subsequent delay
    pub backoff_multiplier: f32,
    /// Ceiling for a single delay (milliseconds)
    pub max_delay_ms: u64,
    /// Per-attempt timeout (seconds)
    pub request_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: retry::DEFAULT_MAX_RETRIES,
            retry_delay_ms: retry::DEFAULT_RETRY_DELAY_MS,
            backoff_multiplier: retry::DEFAULT_BACKOFF_MULTIPLIER,
            max_delay_ms: retry::DEFAULT_MAX_DELAY_MS,
            request_timeout_secs: network::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0) {
            return Err(ReviewError::Config(format!(
                "retry.backoff_multiplier must be >= 1, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_delay_ms < self.retry_delay_ms {
            return Err(ReviewError::Config(format!(
                "retry.max_delay_ms ({}) must be >= retry.retry_delay_ms ({})",
                self.max_delay_ms, self.retry_delay_ms
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ReviewError::Config(
                "retry.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Rate Limit Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests_per_window: u32,
    pub max_tokens_per_window: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_window: rate_limit::DEFAULT_MAX_REQUESTS_PER_WINDOW,
            max_tokens_per_window: rate_limit::DEFAULT_MAX_TOKENS_PER_WINDOW,
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_requests_per_window == 0 || self.max_tokens_per_window == 0 {
            return Err(ReviewError::Config(
                "rate_limit limits must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Scan Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Glob patterns skipped during discovery
    pub exclude: Vec<String>,

    /// Path substrings a file must contain to be reviewed (empty = all)
    pub include_patterns: Vec<String>,

    /// Path substrings that drop a file from review
    pub exclude_patterns: Vec<String>,

    /// Per-file token cap for truncation (unset = no truncation)
    pub max_tokens_per_file: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude: vec![
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
                "**/target/**".to_string(),
                "**/dist/**".to_string(),
            ],
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            max_tokens_per_file: None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
