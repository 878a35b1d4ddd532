//! Rate-limited Retrying Request Client
//!
//! Turns a candidate file set into one review request:
//!
//! 1. Optimize files into the budget (fail fast when nothing fits)
//! 2. Build messages and size the response ceiling
//! 3. Reserve rate-limit quota (never retried locally)
//! 4. Attempt loop with exponential backoff; only transient failures retry
//! 5. Commit actual usage and validate the response text
//!
//! Cancellation aborts the in-flight attempt or backoff sleep immediately and
//! does not consume a retry slot.

use std::time::{Duration, Instant};

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::ai::budget::{Budget, BudgetOptimizer, OptimizationResult, OptimizeOptions};
use crate::ai::prompt::{PromptContext, ReviewPrompt};
use crate::ai::provider::{ChatCompletion, ChatRequest, SharedTransport};
use crate::ai::rate_limit::SharedRateLimiter;
use crate::ai::timeout::attempt_with_timeout;
use crate::ai::validation::ResponseValidator;
use crate::config::{LlmConfig, RetryConfig};
use crate::constants::response as response_constants;
use crate::types::{
    ErrorCategory, LlmError, Result, ReviewError, ReviewFile, ReviewResult, TokenUsage,
};

// =============================================================================
// Retry Policy
// =============================================================================

/// Validated retry settings
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_delay: Duration,
    backoff_multiplier: f32,
    max_delay: Duration,
    request_timeout: Duration,
}

impl TryFrom<&RetryConfig> for RetryPolicy {
    type Error = ReviewError;

    fn try_from(config: &RetryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::constants::retry::DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(crate::constants::retry::DEFAULT_RETRY_DELAY_MS),
            backoff_multiplier: crate::constants::retry::DEFAULT_BACKOFF_MULTIPLIER,
            max_delay: Duration::from_millis(crate::constants::retry::DEFAULT_MAX_DELAY_MS),
            request_timeout: Duration::from_secs(
                crate::constants::network::DEFAULT_TIMEOUT_SECS,
            ),
        }
    }
}

impl RetryPolicy {
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// `max_retries + 1`
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Delays before attempts 2..=max_attempts:
    /// `retry_delay * multiplier^(n-1)`, capped at `max_delay`, no jitter
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.retry_delay)
            .with_factor(self.backoff_multiplier)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries as usize)
            .build()
    }
}

// =============================================================================
// Attempt Records
// =============================================================================

/// One iteration of the attempt loop
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAttempt {
    /// 1-based
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// `None` on success
    pub error: Option<LlmError>,
}

impl RequestAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_category(&self) -> Option<ErrorCategory> {
        self.error.as_ref().map(|e| e.category)
    }
}

/// Everything one successful `review` call produced
#[derive(Debug, Clone)]
pub struct ReviewDispatch {
    pub result: ReviewResult,
    pub optimization: OptimizationResult,
    pub attempts: Vec<RequestAttempt>,
    /// Estimated tokens of all request messages
    pub input_tokens: u64,
    /// `max_tokens` sent with the request
    pub response_ceiling: u64,
}

// =============================================================================
// Client
// =============================================================================

pub struct RetryingRequestClient {
    transport: SharedTransport,
    rate_limiter: SharedRateLimiter,
    policy: RetryPolicy,
    model: String,
    temperature: f32,
}

impl RetryingRequestClient {
    pub fn new(
        transport: SharedTransport,
        rate_limiter: SharedRateLimiter,
        policy: RetryPolicy,
        llm: &LlmConfig,
    ) -> Self {
        Self {
            transport,
            rate_limiter,
            policy,
            model: llm.model.clone(),
            temperature: llm.temperature,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn rate_limiter(&self) -> &SharedRateLimiter {
        &self.rate_limiter
    }

    /// Review `files` and return the validated result
    pub async fn review(
        &self,
        files: &[ReviewFile],
        budget: &Budget,
        options: &OptimizeOptions,
        context: &PromptContext,
        cancel: &CancellationToken,
    ) -> Result<ReviewResult> {
        self.review_detailed(files, budget, options, context, cancel)
            .await
            .map(|dispatch| dispatch.result)
    }

    /// Review `files`, keeping optimization and attempt details
    #[instrument(skip_all, fields(files = files.len(), model = %self.model))]
    pub async fn review_detailed(
        &self,
        files: &[ReviewFile],
        budget: &Budget,
        options: &OptimizeOptions,
        context: &PromptContext,
        cancel: &CancellationToken,
    ) -> Result<ReviewDispatch> {
        let optimizer = BudgetOptimizer::new(budget.clone());
        let optimization = optimizer.optimize(files, options);

        if optimization.optimized.is_empty() {
            return Err(ReviewError::NoFilesFit {
                candidates: files.len(),
                available_tokens: budget.available_tokens(),
            });
        }
        optimizer
            .check_limits(&optimization.optimized)
            .into_result()?;

        let messages = ReviewPrompt::messages(&optimization.optimized, context);
        let estimator = budget.estimator();
        let input_tokens: u64 = messages.iter().map(|m| estimator.count(&m.content)).sum();
        let response_ceiling = Self::response_ceiling(input_tokens, budget);

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: response_ceiling,
            temperature: self.temperature,
        };

        let reservation = self.rate_limiter.check_and_reserve(input_tokens)?;
        debug!(
            input_tokens,
            response_ceiling,
            files = optimization.optimized.len(),
            "Reserved rate limit quota"
        );

        let (completion, attempts) = self.dispatch(&request, cancel).await?;

        let usage = match completion.usage {
            Some(u) => TokenUsage::reported(u.prompt_tokens, u.completion_tokens),
            None => TokenUsage::estimated(input_tokens, estimator.count(&completion.content)),
        };
        self.rate_limiter.commit(reservation, usage.total_tokens);

        let result = ResponseValidator::parse(&completion.content).with_usage(usage);
        info!(
            status = %result.overall_status(),
            issues = result.issues.len(),
            attempts = attempts.len(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Review completed"
        );

        Ok(ReviewDispatch {
            result,
            optimization,
            attempts,
            input_tokens,
            response_ceiling,
        })
    }

    /// `max(2000, input * 0.5)` capped at the budget's `max_tokens`
    pub fn response_ceiling(input_tokens: u64, budget: &Budget) -> u64 {
        let proportional = (input_tokens as f64 * response_constants::RESPONSE_TOKEN_RATIO).ceil() as u64;
        proportional
            .max(response_constants::MIN_RESPONSE_TOKENS)
            .min(budget.max_tokens())
    }

    async fn dispatch(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<(ChatCompletion, Vec<RequestAttempt>)> {
        let mut delays = self.policy.backoff();
        let mut attempts = Vec::new();
        let mut last_error = None;

        for attempt in 1..=self.policy.max_attempts() {
            if attempt > 1 {
                let delay = delays.next().unwrap_or(self.policy.max_delay);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ReviewError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let started_at = Utc::now();
            let start = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ReviewError::Cancelled),
                outcome = attempt_with_timeout(
                    self.policy.request_timeout,
                    self.transport.send(request),
                ) => outcome,
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(completion) => {
                    attempts.push(RequestAttempt {
                        attempt_number: attempt,
                        started_at,
                        duration_ms,
                        error: None,
                    });
                    return Ok((completion, attempts));
                }
                Err(err) => {
                    warn!(
                        transport = self.transport.name(),
                        attempt,
                        max_attempts = self.policy.max_attempts(),
                        category = %err.category,
                        error = %err,
                        "Review request attempt failed"
                    );
                    attempts.push(RequestAttempt {
                        attempt_number: attempt,
                        started_at,
                        duration_ms,
                        error: Some(err.clone()),
                    });
                    if !err.is_retryable() {
                        return Err(ReviewError::Llm(err));
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(ReviewError::ExhaustedRetries {
            attempts: attempts.len() as u32,
            last_error: last_error
                .unwrap_or_else(|| LlmError::transient("no attempt was made")),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{ChatTransport, ProviderUsage};
    use crate::ai::rate_limit::RateLimiter;
    use crate::config::RateLimitConfig;
    use crate::types::{ErrorClassifier, OverallStatus};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    const VALID_RESPONSE: &str = r#"Here is my review:
{"summary":{"overallStatus":"PASS"},"issues":[],"recommendations":{"immediate":[],"longTerm":[]}}"#;

    enum Step {
        Reply(ChatCompletion),
        Fail(LlmError),
        Hang,
    }

    /// Plays back scripted outcomes, then answers with a valid review
    struct ScriptedTransport {
        script: Mutex<VecDeque<Step>>,
        calls: AtomicU32,
        last_request: Mutex<Option<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(steps.into()),
                calls: AtomicU32::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(
            &self,
            request: &ChatRequest,
        ) -> std::result::Result<ChatCompletion, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(c)) => Ok(c),
                Some(Step::Fail(e)) => Err(e),
                Some(Step::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                None => Ok(ChatCompletion::text(VALID_RESPONSE)),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::try_from(&RetryConfig {
            max_retries,
            retry_delay_ms: 100,
            backoff_multiplier: 2.0,
            max_delay_ms: 1_000,
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    fn client_with(
        transport: Arc<ScriptedTransport>,
        max_retries: u32,
        limits: RateLimitConfig,
    ) -> RetryingRequestClient {
        RetryingRequestClient::new(
            transport,
            RateLimiter::shared(&limits).unwrap(),
            policy(max_retries),
            &LlmConfig::default(),
        )
    }

    fn client(transport: Arc<ScriptedTransport>, max_retries: u32) -> RetryingRequestClient {
        client_with(transport, max_retries, RateLimitConfig::default())
    }

    fn files() -> Vec<ReviewFile> {
        vec![
            ReviewFile::new("src/auth.rs", "fn login() {}\n"),
            ReviewFile::new("src/db.rs", "fn query() {}\n"),
        ]
    }

    fn budget() -> Budget {
        Budget::new(4000, 500).unwrap()
    }

    async fn run(client: &RetryingRequestClient) -> Result<ReviewDispatch> {
        client
            .review_detailed(
                &files(),
                &budget(),
                &OptimizeOptions::default(),
                &PromptContext::default(),
                &CancellationToken::new(),
            )
            .await
    }

    #[test]
    fn test_backoff_schedule() {
        let delays: Vec<_> = RetryPolicy::try_from(&RetryConfig {
            max_retries: 5,
            retry_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            max_delay_ms: 5_000,
            request_timeout_secs: 10,
        })
        .unwrap()
        .backoff()
        .collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(5),
                Duration::from_secs(5),
            ]
        );
    }

    #[test]
    fn test_response_ceiling() {
        let budget = budget();
        assert_eq!(RetryingRequestClient::response_ceiling(100, &budget), 2000);
        assert_eq!(RetryingRequestClient::response_ceiling(5000, &budget), 2500);
        assert_eq!(RetryingRequestClient::response_ceiling(50_000, &budget), 4000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_transient_failures_then_success() {
        let transport = ScriptedTransport::new(vec![
            Step::Fail(ErrorClassifier::classify_http_status(503, "unavailable")),
            Step::Fail(LlmError::transient("connection reset")),
        ]);
        let client = client(transport.clone(), 2);

        let dispatch = run(&client).await.unwrap();
        assert_eq!(transport.calls(), 3);
        assert_eq!(dispatch.attempts.len(), 3);
        assert!(dispatch.attempts[2].succeeded());
        assert_eq!(
            dispatch.attempts[0].error_category(),
            Some(ErrorCategory::Transient)
        );
        assert_eq!(dispatch.result.overall_status(), OverallStatus::Pass);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Step::Fail(
            ErrorClassifier::classify_http_status(401, "invalid api key"),
        )]);
        let client = client(transport.clone(), 2);

        let err = run(&client).await.unwrap_err();
        assert_eq!(transport.calls(), 1);
        assert!(matches!(
            err,
            ReviewError::Llm(LlmError {
                category: ErrorCategory::Auth,
                status: Some(401),
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_429_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Step::Fail(
            ErrorClassifier::classify_http_status(429, "slow down"),
        )]);
        let client = client(transport.clone(), 3);

        let err = run(&client).await.unwrap_err();
        assert_eq!(transport.calls(), 1);
        assert!(err.is_recoverable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_carries_last_error() {
        let transport = ScriptedTransport::new(vec![
            Step::Fail(LlmError::transient("first")),
            Step::Fail(LlmError::transient("second")),
        ]);
        let client = client(transport.clone(), 1);

        match run(&client).await.unwrap_err() {
            ReviewError::ExhaustedRetries {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(last_error.message, "second");
            }
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_retried() {
        let transport = ScriptedTransport::new(vec![Step::Hang]);
        let client = client(transport.clone(), 1);

        let dispatch = run(&client).await.unwrap();
        assert_eq!(transport.calls(), 2);
        let first = dispatch.attempts[0].error.as_ref().unwrap();
        assert!(first.message.contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_attempt() {
        let transport = ScriptedTransport::new(vec![Step::Hang]);
        let client = client(transport.clone(), 3);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = client
            .review(
                &files(),
                &budget(),
                &OptimizeOptions::default(),
                &PromptContext::default(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::Cancelled));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let transport = ScriptedTransport::new(vec![Step::Fail(
            ErrorClassifier::classify_http_status(503, "unavailable"),
        )]);
        let client = client(transport.clone(), 3);
        let cancel = CancellationToken::new();

        // Backoff before attempt 2 is 100ms
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let err = client
            .review(
                &files(),
                &budget(),
                &OptimizeOptions::default(),
                &PromptContext::default(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::Cancelled));
        assert_eq!(transport.calls(), 1);
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_dispatch_sends_nothing() {
        let transport = ScriptedTransport::new(vec![]);
        let client = client(transport.clone(), 3);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .review(
                &files(),
                &budget(),
                &OptimizeOptions::default(),
                &PromptContext::default(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::Cancelled));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_files_fit_sends_nothing() {
        let transport = ScriptedTransport::new(vec![]);
        let client = client(transport.clone(), 2);
        let files = vec![ReviewFile::new("big.rs", "x".repeat(20_000))];

        let err = client
            .review(
                &files,
                &budget(),
                &OptimizeOptions::default(),
                &PromptContext::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReviewError::NoFilesFit {
                candidates: 1,
                available_tokens: 3500
            }
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_propagates_without_attempt() {
        let transport = ScriptedTransport::new(vec![]);
        let client = client_with(
            transport.clone(),
            2,
            RateLimitConfig {
                max_requests_per_window: 1,
                max_tokens_per_window: 1_000_000,
            },
        );

        run(&client).await.unwrap();
        let err = run(&client).await.unwrap_err();
        assert!(matches!(err, ReviewError::RateLimited(_)));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_payload_and_reported_usage() {
        let transport = ScriptedTransport::new(vec![Step::Reply(ChatCompletion {
            content: VALID_RESPONSE.to_string(),
            usage: Some(ProviderUsage {
                prompt_tokens: 700,
                completion_tokens: 40,
            }),
            model: None,
        })]);
        let client = client(transport.clone(), 0);

        let dispatch = run(&client).await.unwrap();
        let request = transport.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.max_tokens, 2000);
        assert_eq!(dispatch.response_ceiling, 2000);

        assert_eq!(dispatch.result.usage, TokenUsage::reported(700, 40));
        // Reservation is topped up to actual usage, never lowered
        let window = client.rate_limiter().snapshot();
        assert_eq!(window.token_count, dispatch.input_tokens.max(740));
        assert!(window.token_count >= dispatch.input_tokens);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_response_is_error_result_not_failure() {
        let transport = ScriptedTransport::new(vec![Step::Reply(ChatCompletion::text(
            "I could not review this.",
        ))]);
        let client = client(transport.clone(), 2);

        let dispatch = run(&client).await.unwrap();
        assert!(dispatch.result.is_error());
        assert_eq!(
            dispatch.result.parse_error.as_deref(),
            Some("No JSON found in response")
        );
        assert!(dispatch.result.usage.estimated);
        assert_eq!(transport.calls(), 1);
    }
}
