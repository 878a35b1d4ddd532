//! Reviewloom - Budget-Aware LLM Code Review Pipeline
//!
//! Takes a set of source files, fits them into a token budget, sends one review
//! request to a chat-completion service and returns a schema-validated result.
//!
//! ## Core Features
//!
//! - **Token Budget Management**: importance-ranked selection with truncation
//! - **Client-Side Rate Limiting**: fixed request/token window, shareable across pipelines
//! - **Classified Retries**: exponential backoff for transient failures only
//! - **Response Validation**: malformed model output becomes an explicit ERROR result
//!
//! ## Quick Start
//!
//! ```ignore
//! use reviewloom::{ConfigLoader, FileScanner, PromptContext, ReviewPipeline, create_transport};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ConfigLoader::load()?;
//! let files = FileScanner::new("src").with_exclude(&config.scan.exclude).load()?;
//! let pipeline = ReviewPipeline::from_config(&config, create_transport(&config.llm)?)?;
//! let outcome = pipeline
//!     .run(&files, &PromptContext::default(), &CancellationToken::new())
//!     .await?;
//! println!("{}", outcome.result.overall_status());
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: budget optimizer, rate limiter, request client, prompt and validation
//! - [`analyzer`]: gitignore-aware file discovery
//! - [`config`]: layered configuration
//! - [`pipeline`]: optimize → dispatch → validate orchestration
//! - [`types`]: review result model and error types

pub mod ai;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod constants;
pub mod pipeline;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, LlmError, PipelineErrorKind, Result, ReviewError};

// Review Model
pub use types::{Issue, OverallStatus, ReviewFile, ReviewResult, Severity, TokenUsage};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{ReviewOutcome, ReviewPipeline};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    // Budget
    Budget,
    BudgetOptimizer,
    // Transport
    ChatTransport,
    OptimizeOptions,
    // Prompt
    PromptContext,
    // Rate limiting
    RateLimiter,
    ResponseValidator,
    // Client
    RetryPolicy,
    RetryingRequestClient,
    SharedRateLimiter,
    SharedTransport,
    TokenEstimator,
    create_transport,
};

// =============================================================================
// Analyzer Re-exports
// =============================================================================

pub use analyzer::FileScanner;
