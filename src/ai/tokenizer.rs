//! Token Estimation
//!
//! Converts text length into an approximate token count and cost.
//!
//! ## Strategy
//! - Fixed characters-per-token ratio, no tokenizer model
//! - Estimates are made before anything is sent to the LLM
//! - Monotonic in text length so budget decisions stay stable

use crate::constants::tokens as token_constants;

/// Character-ratio token and cost estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenEstimator {
    tokens_per_char: f64,
    price_per_k_tokens: f64,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(
            token_constants::DEFAULT_TOKENS_PER_CHAR,
            token_constants::DEFAULT_PRICE_PER_K_TOKENS,
        )
    }
}

impl TokenEstimator {
    pub fn new(tokens_per_char: f64, price_per_k_tokens: f64) -> Self {
        Self {
            tokens_per_char,
            price_per_k_tokens,
        }
    }

    /// Estimate tokens for optional text; `None` and empty text cost nothing
    pub fn estimate_tokens(&self, text: Option<&str>) -> u64 {
        match text {
            Some(t) if !t.is_empty() => self.tokens_for_chars(t.chars().count()),
            _ => 0,
        }
    }

    /// Estimate tokens for text (convenience for non-optional input)
    pub fn count(&self, text: &str) -> u64 {
        self.estimate_tokens(Some(text))
    }

    /// `ceil(chars * tokens_per_char)`
    pub fn tokens_for_chars(&self, chars: usize) -> u64 {
        if chars == 0 {
            return 0;
        }
        (chars as f64 * self.tokens_per_char).ceil() as u64
    }

    /// Estimated cost in USD
    pub fn estimate_cost(&self, tokens: u64) -> f64 {
        if tokens == 0 {
            return 0.0;
        }
        tokens as f64 / 1000.0 * self.price_per_k_tokens
    }

    pub fn tokens_per_char(&self) -> f64 {
        self.tokens_per_char
    }
}
