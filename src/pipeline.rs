//! Review Pipeline
//!
//! Root orchestrator: optimize files → dispatch request → validate response.
//! One in-flight request per `run`; the rate limiter may be shared between
//! pipelines in the same process.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::ai::{
    Budget, ExcludedFile, OptimizeOptions, PromptContext, RateLimiter, RetryPolicy,
    RetryingRequestClient, SharedRateLimiter, SharedTransport,
};
use crate::config::Config;
use crate::types::{Result, ReviewFile, ReviewResult};

/// Everything the metrics/audit and issue-creation consumers need from one run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub run_id: Uuid,
    pub reviewed_at: DateTime<Utc>,
    pub result: ReviewResult,
    /// Paths sent to the model, in request order
    pub files_reviewed: Vec<String>,
    pub files_truncated: Vec<String>,
    pub excluded: Vec<ExcludedFile>,
    pub attempts: u32,
    pub elapsed_ms: u64,
    /// USD, from reported or estimated usage
    pub estimated_cost: f64,
}

pub struct ReviewPipeline {
    client: RetryingRequestClient,
    budget: Budget,
    options: OptimizeOptions,
}

impl ReviewPipeline {
    /// Pipeline with its own rate limiter
    pub fn from_config(config: &Config, transport: SharedTransport) -> Result<Self> {
        let limiter = RateLimiter::shared(&config.rate_limit)?;
        Self::with_rate_limiter(config, transport, limiter)
    }

    /// Pipeline drawing on a limiter shared with other pipelines
    pub fn with_rate_limiter(
        config: &Config,
        transport: SharedTransport,
        rate_limiter: SharedRateLimiter,
    ) -> Result<Self> {
        config.validate()?;
        let budget = Budget::try_from(&config.budget)?;
        let policy = RetryPolicy::try_from(&config.retry)?;

        Ok(Self {
            client: RetryingRequestClient::new(transport, rate_limiter, policy, &config.llm),
            budget,
            options: OptimizeOptions::from(&config.scan),
        })
    }

    pub fn with_options(mut self, options: OptimizeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    pub fn options(&self) -> &OptimizeOptions {
        &self.options
    }

    #[instrument(skip_all, fields(files = files.len()))]
    pub async fn run(
        &self,
        files: &[ReviewFile],
        context: &PromptContext,
        cancel: &CancellationToken,
    ) -> Result<ReviewOutcome> {
        let run_id = Uuid::new_v4();
        let reviewed_at = Utc::now();
        let start = Instant::now();

        let dispatch = self
            .client
            .review_detailed(files, &self.budget, &self.options, context, cancel)
            .await?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let estimated_cost = self
            .budget
            .estimator()
            .estimate_cost(dispatch.result.usage.total_tokens);

        let optimized = &dispatch.optimization.optimized;
        let outcome = ReviewOutcome {
            run_id,
            reviewed_at,
            files_reviewed: optimized.iter().map(|f| f.path.clone()).collect(),
            files_truncated: optimized
                .iter()
                .filter(|f| f.truncated)
                .map(|f| f.path.clone())
                .collect(),
            excluded: dispatch.optimization.excluded,
            attempts: dispatch.attempts.len() as u32,
            elapsed_ms,
            estimated_cost,
            result: dispatch.result,
        };

        info!(
            %run_id,
            status = %outcome.result.overall_status(),
            reviewed = outcome.files_reviewed.len(),
            excluded = outcome.excluded.len(),
            elapsed_ms,
            cost = estimated_cost,
            "Review pipeline finished"
        );

        Ok(outcome)
    }
}
