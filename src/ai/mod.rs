//! AI Integration Layer
//!
//! Budgeting, rate limiting, dispatch and validation for LLM review requests.

pub mod budget;
pub mod client;
pub mod prompt;
pub mod provider;
pub mod rate_limit;
pub mod timeout;
pub mod tokenizer;
pub mod validation;

pub use budget::{
    Budget, BudgetAnalysis, BudgetOptimizer, ExcludedFile, ExclusionReason, FileTokens,
    LimitCheck, OptimizationResult, OptimizeOptions, Truncation, importance_score,
};
pub use client::{RequestAttempt, RetryPolicy, RetryingRequestClient, ReviewDispatch};
pub use prompt::{PromptBuilder, PromptContext, ReviewPrompt};
pub use provider::{
    ChatCompletion, ChatMessage, ChatRequest, ChatTransport, OpenAiTransport, SharedTransport,
    create_transport,
};
pub use rate_limit::{RateLimiter, RateWindow, Reservation, SharedRateLimiter};
pub use tokenizer::TokenEstimator;
pub use validation::{ResponseValidator, extract_first_json_object};
