pub mod error;
pub mod file;
pub mod review;

pub use error::{
    ErrorCategory, ErrorClassifier, LimitReason, LlmError, PipelineErrorKind, RateLimitExceeded,
    Result, ReviewError,
};
pub use file::ReviewFile;
pub use review::{
    Category, Issue, OverallStatus, Recommendations, ReviewResult, ReviewSummary, Severity,
    TokenUsage,
};
