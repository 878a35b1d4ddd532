//! Unified Error Type System
//!
//! Centralized error types for the review pipeline.
//! Provides error classification for retry decisions.
//!
//! ## Error Categories
//!
//! - **Transient**: Network failures, timeouts, 5xx (retry with backoff)
//! - **Auth**: 401/403 (fail fast)
//! - **BadRequest**: 400 and other client errors (fail fast)
//! - **RateLimited**: 429 (fail fast, the caller owns resubmission)
//! - **Validation**: Request could not be built (fail fast)
//!
//! Response-shape problems are not errors here: the response validator turns
//! them into a `ReviewResult` with `ERROR` status.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Failure classes used to decide whether an attempt may be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network errors, timeouts and 5xx responses
    Transient,
    /// Authentication or permission failure
    Auth,
    /// The service rejected the request as malformed
    BadRequest,
    /// The service rate limited the request
    RateLimited,
    /// The request failed local validation before being sent
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Auth => write!(f, "FATAL_AUTH"),
            Self::BadRequest => write!(f, "FATAL_REQUEST"),
            Self::RateLimited => write!(f, "FATAL_RATE_LIMITED"),
            Self::Validation => write!(f, "FATAL_VALIDATION"),
        }
    }
}

impl ErrorCategory {
    /// Only transient failures consume another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Classified failure of a single request attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmError {
    pub category: ErrorCategory,
    pub message: String,
    /// HTTP status when the service answered
    pub status: Option<u16>,
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "[{}:{}] {}", self.category, status, self.message),
            None => write!(f, "[{}] {}", self.category, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            status: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Transient, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps transport outcomes onto [`ErrorCategory`]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify a non-success HTTP status
    pub fn classify_http_status(status: u16, body: &str) -> LlmError {
        let message = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", preview(body, 300))
        };

        let category = match status {
            400 => ErrorCategory::BadRequest,
            401 | 403 => ErrorCategory::Auth,
            429 => ErrorCategory::RateLimited,
            500..=599 => ErrorCategory::Transient,
            402..=499 => ErrorCategory::BadRequest,
            _ => ErrorCategory::Transient,
        };

        LlmError::new(category, message).with_status(status)
    }

    /// Classify a failure raised by the HTTP client before a status was seen
    pub fn classify_transport(err: &reqwest::Error) -> LlmError {
        if err.is_builder() {
            return LlmError::new(ErrorCategory::Validation, err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::classify_http_status(status.as_u16(), &err.to_string());
        }
        // Connect, timeout, body and decode failures are all worth another attempt
        LlmError::transient(err.to_string())
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

// =============================================================================
// Budget & Rate Limit Errors
// =============================================================================

/// Why a file set does not fit its budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitReason {
    OversizedFiles,
    SizeLimitExceeded,
    TokenLimitExceeded,
}

impl LimitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OversizedFiles => "oversized_files",
            Self::SizeLimitExceeded => "size_limit_exceeded",
            Self::TokenLimitExceeded => "token_limit_exceeded",
        }
    }
}

impl fmt::Display for LimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local rate limit window is full
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    /// Time until the current window resets
    pub retry_after: Duration,
    pub message: String,
}

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (window resets in {:.1}s)",
            self.message,
            self.retry_after.as_secs_f64()
        )
    }
}

impl std::error::Error for RateLimitExceeded {}

// =============================================================================
// Application Error
// =============================================================================

/// Stable discriminant for callers deciding whether to fail, warn or retry later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    NoFilesFit,
    Budget,
    RateLimited,
    Fatal,
    ExhaustedRetries,
    Cancelled,
    Config,
    Io,
}

#[derive(Debug, Error)]
pub enum ReviewError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Budget Errors
    // -------------------------------------------------------------------------
    #[error("Budget check failed ({reason}): {message}")]
    Budget {
        reason: LimitReason,
        measured: u64,
        allowed: u64,
        message: String,
    },

    #[error("No files fit the review budget: {candidates} candidates, {available_tokens} tokens available")]
    NoFilesFit {
        candidates: usize,
        available_tokens: u64,
    },

    // -------------------------------------------------------------------------
    // Dispatch Errors
    // -------------------------------------------------------------------------
    #[error("Rate limit exceeded: {0}")]
    RateLimited(RateLimitExceeded),

    /// Fatal classified failure, never retried
    #[error("LLM request failed: {0}")]
    Llm(LlmError),

    #[error("LLM request failed after {attempts} attempts: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: LlmError },

    #[error("Review cancelled")]
    Cancelled,

}

impl From<LlmError> for ReviewError {
    fn from(err: LlmError) -> Self {
        ReviewError::Llm(err)
    }
}

impl From<RateLimitExceeded> for ReviewError {
    fn from(err: RateLimitExceeded) -> Self {
        ReviewError::RateLimited(err)
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;

impl ReviewError {
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            Self::Io(_) => PipelineErrorKind::Io,
            Self::Json(_) | Self::Config(_) => PipelineErrorKind::Config,
            Self::Budget { .. } => PipelineErrorKind::Budget,
            Self::NoFilesFit { .. } => PipelineErrorKind::NoFilesFit,
            Self::RateLimited(_) => PipelineErrorKind::RateLimited,
            Self::Llm(_) => PipelineErrorKind::Fatal,
            Self::ExhaustedRetries { .. } => PipelineErrorKind::ExhaustedRetries,
            Self::Cancelled => PipelineErrorKind::Cancelled,
        }
    }

    /// Whether resubmitting the whole review later may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            PipelineErrorKind::RateLimited | PipelineErrorKind::ExhaustedRetries
        ) || matches!(self, Self::Llm(e) if e.category == ErrorCategory::RateLimited)
    }
}

// =============================================================================
// Tests
// =============================================================================
