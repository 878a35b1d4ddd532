//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Token estimation constants
pub mod tokens {
    /// Approximate tokens per character (4 chars = 1 token)
    pub const DEFAULT_TOKENS_PER_CHAR: f64 = 0.25;

    /// Price per 1K tokens in USD
    pub const DEFAULT_PRICE_PER_K_TOKENS: f64 = 0.01;
}

/// Request budget constants
pub mod budget {
    /// Context window ceiling for a single review request
    pub const DEFAULT_MAX_TOKENS: u64 = 128_000;

    /// Tokens held back for the expected response
    pub const DEFAULT_RESERVED_TOKENS: u64 = 8_000;

    /// Maximum size of a single file (bytes)
    pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 512 * 1024;

    /// Maximum combined size of all files (bytes)
    pub const DEFAULT_MAX_TOTAL_SIZE_BYTES: u64 = 2 * 1024 * 1024;

    /// Line appended to a file whose content was cut to fit the budget
    pub const TRUNCATION_MARKER: &str = "... [truncated to fit review budget] ...";
}

/// Importance scoring weights
pub mod importance {
    pub const BASE_SCORE: f64 = 1.0;

    /// Vendored, generated or build output
    pub const GENERATED_PENALTY: f64 = 0.4;

    pub const TEST_PENALTY: f64 = 0.2;

    /// Upper bound of the size penalty
    pub const MAX_SIZE_PENALTY: f64 = 0.3;

    /// Content length at which the size penalty saturates the divisor
    pub const SIZE_PENALTY_DIVISOR: f64 = 50_000.0;
}

/// Retry constants
pub mod retry {
    /// Retries after the first attempt
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

    /// Backoff multiplier
    pub const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

    /// Maximum delay between retries (milliseconds)
    pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
}

/// Rate limit constants
pub mod rate_limit {
    /// Fixed sliding window length (seconds)
    pub const WINDOW_SECS: u64 = 60;

    pub const DEFAULT_MAX_REQUESTS_PER_WINDOW: u32 = 50;

    pub const DEFAULT_MAX_TOKENS_PER_WINDOW: u64 = 400_000;
}

/// Response sizing constants
pub mod response {
    /// Floor of the completion token ceiling
    pub const MIN_RESPONSE_TOKENS: u64 = 2_000;

    /// Fraction of the input estimate requested as completion tokens
    pub const RESPONSE_TOKEN_RATIO: f64 = 0.5;

    pub const DEFAULT_TEMPERATURE: f32 = 0.1;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

    pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

    pub const DEFAULT_MODEL: &str = "gpt-4o";
}
