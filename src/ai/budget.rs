//! Request Budget Optimization
//!
//! Decides which file content can be sent in a single review request:
//! - Per-file and total size/token analysis
//! - Ordered limit checks with human-readable recommendations
//! - Importance-ordered selection with line-granular truncation

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::ai::tokenizer::TokenEstimator;
use crate::config::{BudgetConfig, ScanConfig};
use crate::constants::{budget as budget_constants, importance};
use crate::types::{LimitReason, Result, ReviewError, ReviewFile};

// =============================================================================
// Budget
// =============================================================================

/// Validated, immutable request budget
#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    max_tokens: u64,
    reserved_tokens: u64,
    max_file_size_bytes: u64,
    max_total_size_bytes: u64,
    estimator: TokenEstimator,
}

impl TryFrom<&BudgetConfig> for Budget {
    type Error = ReviewError;

    fn try_from(config: &BudgetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_tokens: config.max_tokens,
            reserved_tokens: config.reserved_tokens,
            max_file_size_bytes: config.max_file_size_bytes,
            max_total_size_bytes: config.max_total_size_bytes,
            estimator: TokenEstimator::new(config.tokens_per_char, config.price_per_k_tokens),
        })
    }
}

impl TryFrom<BudgetConfig> for Budget {
    type Error = ReviewError;

    fn try_from(config: BudgetConfig) -> Result<Self> {
        Self::try_from(&config)
    }
}

impl Budget {
    /// Token limits with default size limits and estimator
    pub fn new(max_tokens: u64, reserved_tokens: u64) -> Result<Self> {
        Self::try_from(BudgetConfig {
            max_tokens,
            reserved_tokens,
            ..Default::default()
        })
    }

    pub fn max_tokens(&self) -> u64 {
        self.max_tokens
    }

    pub fn reserved_tokens(&self) -> u64 {
        self.reserved_tokens
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_bytes
    }

    pub fn max_total_size_bytes(&self) -> u64 {
        self.max_total_size_bytes
    }

    /// Tokens usable for input: `max_tokens - reserved_tokens`
    pub fn available_tokens(&self) -> u64 {
        self.max_tokens - self.reserved_tokens
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }
}

// =============================================================================
// Analysis
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FileTokens {
    pub path: String,
    pub tokens: u64,
    pub size_bytes: u64,
    pub oversized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetAnalysis {
    pub total_tokens: u64,
    pub per_file: Vec<FileTokens>,
    /// Paths whose size exceeds the per-file limit (reported, not removed)
    pub oversized_files: Vec<String>,
    pub total_size_bytes: u64,
    pub estimated_cost: f64,
}

/// Outcome of [`BudgetOptimizer::check_limits`]
#[derive(Debug, Clone, PartialEq)]
pub struct LimitCheck {
    pub within_limits: bool,
    pub reason: Option<LimitReason>,
    pub available_tokens: u64,
    pub used_tokens: u64,
    /// `used_tokens / available_tokens`
    pub utilization: f64,
    pub recommendations: Vec<String>,
    /// Measured value for the failing limit
    pub measured: u64,
    /// Allowed value for the failing limit
    pub allowed: u64,
}

impl LimitCheck {
    /// Convert a failed check into a budget error
    pub fn into_result(self) -> Result<Self> {
        match self.reason {
            None => Ok(self),
            Some(reason) => Err(ReviewError::Budget {
                reason,
                measured: self.measured,
                allowed: self.allowed,
                message: self.recommendations.join("; "),
            }),
        }
    }
}

// =============================================================================
// Optimization
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct OptimizeOptions {
    /// Drop files whose path contains any of these substrings
    pub exclude_patterns: Vec<String>,
    /// When non-empty, keep only files whose path contains one of these
    pub include_patterns: Vec<String>,
    /// Cap for truncated copies; `None` disables truncation
    pub max_tokens_per_file: Option<u64>,
}

impl From<&ScanConfig> for OptimizeOptions {
    fn from(scan: &ScanConfig) -> Self {
        Self {
            exclude_patterns: scan.exclude_patterns.clone(),
            include_patterns: scan.include_patterns.clone(),
            max_tokens_per_file: scan.max_tokens_per_file,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Removed by include/exclude patterns
    Filtered,
    /// Did not fit whole and could not be truncated to fit
    DoesNotFit,
    /// No budget left when the file was reached
    BudgetExhausted,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filtered => "filtered",
            Self::DoesNotFit => "does_not_fit",
            Self::BudgetExhausted => "budget_exhausted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedFile {
    pub path: String,
    pub tokens: u64,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Selected files in descending importance order
    pub optimized: Vec<ReviewFile>,
    pub excluded: Vec<ExcludedFile>,
    /// True iff at least one file was truncated
    pub optimization_applied: bool,
    /// Estimated tokens of `optimized`
    pub total_tokens: u64,
}

/// Result of cutting file content to a token limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Truncation {
    /// Content already fits
    Unchanged,
    /// Whole-line prefix plus the truncation marker
    Truncated { content: String, tokens: u64 },
    /// The first line does not fit alongside the marker
    CannotTruncate,
}

// =============================================================================
// Importance Heuristics
// =============================================================================

static GENERATED_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^|/)(vendor|node_modules|third_party|dist|build|target|out|\.next|__pycache__|generated)/|\.min\.(js|css)$|\.(lock|map)$|(^|/)(package-lock\.json|pnpm-lock\.yaml|go\.sum)$|\.pb\.go$|_pb2\.py$|\.generated\.",
    )
    .expect("generated-path pattern is valid")
});

static TEST_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^|/)(tests?|__tests__|specs?)/|(_test|\.test|_spec|\.spec)\.[a-z0-9]+$|(^|/)test_[^/]*$",
    )
    .expect("test-path pattern is valid")
});

pub fn is_generated_path(path: &str) -> bool {
    GENERATED_PATH.is_match(path)
}

pub fn is_test_path(path: &str) -> bool {
    TEST_PATH.is_match(path)
}

/// Review value per token: smaller, hand-written, non-test files rank first
pub fn importance_score(file: &ReviewFile) -> f64 {
    let mut score = importance::BASE_SCORE;
    if is_generated_path(&file.path) {
        score -= importance::GENERATED_PENALTY;
    }
    if is_test_path(&file.path) {
        score -= importance::TEST_PENALTY;
    }
    score -= (file.char_len() as f64 / importance::SIZE_PENALTY_DIVISOR)
        .min(importance::MAX_SIZE_PENALTY);
    score
}

// =============================================================================
// Budget Optimizer
// =============================================================================

struct Candidate<'a> {
    file: &'a ReviewFile,
    tokens: u64,
    score: f64,
}

pub struct BudgetOptimizer {
    budget: Budget,
}

impl BudgetOptimizer {
    pub fn new(budget: Budget) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    fn file_tokens(&self, file: &ReviewFile) -> u64 {
        self.budget.estimator.estimate_tokens(file.content.as_deref())
    }

    /// Token and size totals, flagging oversized files
    pub fn analyze(&self, files: &[ReviewFile]) -> BudgetAnalysis {
        let per_file: Vec<FileTokens> = files
            .iter()
            .map(|f| FileTokens {
                path: f.path.clone(),
                tokens: self.file_tokens(f),
                size_bytes: f.size_bytes,
                oversized: f.size_bytes > self.budget.max_file_size_bytes,
            })
            .collect();

        let total_tokens = per_file.iter().map(|f| f.tokens).sum();
        let total_size_bytes = per_file.iter().map(|f| f.size_bytes).sum();
        let oversized_files = per_file
            .iter()
            .filter(|f| f.oversized)
            .map(|f| f.path.clone())
            .collect();

        BudgetAnalysis {
            total_tokens,
            oversized_files,
            total_size_bytes,
            estimated_cost: self.budget.estimator.estimate_cost(total_tokens),
            per_file,
        }
    }

    /// Evaluate limits in order: oversized files, total size, tokens
    pub fn check_limits(&self, files: &[ReviewFile]) -> LimitCheck {
        let analysis = self.analyze(files);
        let available_tokens = self.budget.available_tokens();
        let used_tokens = analysis.total_tokens;

        let mut check = LimitCheck {
            within_limits: true,
            reason: None,
            available_tokens,
            used_tokens,
            utilization: used_tokens as f64 / available_tokens as f64,
            recommendations: Vec::new(),
            measured: used_tokens,
            allowed: available_tokens,
        };

        if !analysis.oversized_files.is_empty() {
            let largest = analysis
                .per_file
                .iter()
                .filter(|f| f.oversized)
                .map(|f| f.size_bytes)
                .max()
                .unwrap_or(0);
            check.reason = Some(LimitReason::OversizedFiles);
            check.measured = largest;
            check.allowed = self.budget.max_file_size_bytes;
            check.recommendations.push(format!(
                "{} file(s) exceed the per-file limit of {} bytes (largest {} bytes): {}; exclude or split them",
                analysis.oversized_files.len(),
                self.budget.max_file_size_bytes,
                largest,
                analysis.oversized_files.join(", ")
            ));
        } else if analysis.total_size_bytes > self.budget.max_total_size_bytes {
            check.reason = Some(LimitReason::SizeLimitExceeded);
            check.measured = analysis.total_size_bytes;
            check.allowed = self.budget.max_total_size_bytes;
            check.recommendations.push(format!(
                "Total size {} bytes exceeds the limit of {} bytes; review fewer files per request",
                analysis.total_size_bytes, self.budget.max_total_size_bytes
            ));
        } else if used_tokens > available_tokens {
            check.reason = Some(LimitReason::TokenLimitExceeded);
            check.recommendations.push(format!(
                "Estimated {} tokens exceeds the {} tokens available ({} max - {} reserved); remove {} tokens or enable truncation",
                used_tokens,
                available_tokens,
                self.budget.max_tokens,
                self.budget.reserved_tokens,
                used_tokens - available_tokens
            ));
        }

        check.within_limits = check.reason.is_none();
        check
    }

    /// Filter, rank and fit files into the available token budget.
    ///
    /// Duplicate paths keep their first occurrence, so `optimized` and
    /// `excluded` never share a path.
    #[instrument(skip_all, fields(files = files.len()))]
    pub fn optimize(&self, files: &[ReviewFile], options: &OptimizeOptions) -> OptimizationResult {
        let available = self.budget.available_tokens();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut excluded = Vec::new();
        let mut candidates = Vec::with_capacity(files.len());

        for file in files {
            if !seen.insert(file.path.as_str()) {
                debug!(path = %file.path, "Dropping duplicate path");
                continue;
            }
            let tokens = self.file_tokens(file);
            if !Self::passes_filters(&file.path, options) {
                debug!(path = %file.path, "Filtered out by patterns");
                excluded.push(ExcludedFile {
                    path: file.path.clone(),
                    tokens,
                    reason: ExclusionReason::Filtered,
                });
                continue;
            }
            candidates.push(Candidate {
                file,
                tokens,
                score: importance_score(file),
            });
        }

        // Stable: ties keep input order
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let mut optimized = Vec::with_capacity(candidates.len());
        let mut used = 0u64;
        let mut optimization_applied = false;

        for candidate in candidates {
            let remaining = available - used;

            if candidate.tokens <= remaining {
                used += candidate.tokens;
                optimized.push(candidate.file.clone());
                continue;
            }

            if remaining == 0 {
                excluded.push(ExcludedFile {
                    path: candidate.file.path.clone(),
                    tokens: candidate.tokens,
                    reason: ExclusionReason::BudgetExhausted,
                });
                continue;
            }

            let truncation = match options.max_tokens_per_file {
                Some(cap) => self.truncate(candidate.file.text(), cap.min(remaining)),
                None => Truncation::CannotTruncate,
            };

            match truncation {
                Truncation::Truncated { content, tokens } => {
                    debug!(
                        path = %candidate.file.path,
                        from = candidate.tokens,
                        to = tokens,
                        "Truncated file to fit budget"
                    );
                    used += tokens;
                    optimization_applied = true;
                    optimized.push(candidate.file.truncated(content));
                }
                // Unchanged cannot happen here: the file did not fit whole
                Truncation::Unchanged | Truncation::CannotTruncate => {
                    debug!(path = %candidate.file.path, tokens = candidate.tokens, remaining, "File does not fit");
                    excluded.push(ExcludedFile {
                        path: candidate.file.path.clone(),
                        tokens: candidate.tokens,
                        reason: ExclusionReason::DoesNotFit,
                    });
                }
            }
        }

        debug!(
            included = optimized.len(),
            excluded = excluded.len(),
            used,
            available,
            "Optimization complete"
        );

        OptimizationResult {
            optimized,
            excluded,
            optimization_applied,
            total_tokens: used,
        }
    }

    fn passes_filters(path: &str, options: &OptimizeOptions) -> bool {
        if options
            .exclude_patterns
            .iter()
            .any(|p| path.contains(p.as_str()))
        {
            return false;
        }
        options.include_patterns.is_empty()
            || options
                .include_patterns
                .iter()
                .any(|p| path.contains(p.as_str()))
    }

    /// Keep the longest whole-line prefix that, together with the truncation
    /// marker, stays within `max_tokens`.
    ///
    /// The marker's tokens come out of `max_tokens`, so a first line that fits
    /// `max_tokens` on its own but not alongside the marker is `CannotTruncate`.
    pub fn truncate(&self, content: &str, max_tokens: u64) -> Truncation {
        let estimator = &self.budget.estimator;
        if estimator.count(content) <= max_tokens {
            return Truncation::Unchanged;
        }

        let marker = budget_constants::TRUNCATION_MARKER;
        let marker_chars = marker.chars().count();
        let Some(prefix_budget) = max_tokens.checked_sub(estimator.tokens_for_chars(marker_chars))
        else {
            return Truncation::CannotTruncate;
        };

        let mut kept_bytes = 0usize;
        let mut kept_chars = 0usize;
        for line in content.split_inclusive('\n') {
            let line_chars = line.chars().count();
            if estimator.tokens_for_chars(kept_chars + line_chars) > prefix_budget {
                break;
            }
            kept_chars += line_chars;
            kept_bytes += line.len();
        }

        if kept_bytes == 0 {
            return Truncation::CannotTruncate;
        }

        let mut truncated = String::with_capacity(kept_bytes + marker.len() + 1);
        truncated.push_str(&content[..kept_bytes]);
        if !truncated.ends_with('\n') {
            truncated.push('\n');
        }
        truncated.push_str(marker);

        let tokens = estimator.count(&truncated);
        Truncation::Truncated {
            content: truncated,
            tokens,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Content of exactly `tokens` tokens at 4 chars/token, in 40-char lines
    fn content_with_tokens(tokens: u64) -> String {
        let chars = (tokens * 4) as usize;
        let line = format!("{}\n", "x".repeat(39));
        let mut s = line.repeat(chars / 40);
        s.push_str(&"y".repeat(chars % 40));
        s
    }

    fn optimizer(max_tokens: u64, reserved: u64) -> BudgetOptimizer {
        BudgetOptimizer::new(Budget::new(max_tokens, reserved).unwrap())
    }

    #[test]
    fn test_budget_rejects_reserved_at_or_above_max() {
        assert!(Budget::new(4000, 4000).is_err());
        assert!(Budget::new(0, 0).is_err());
        assert_eq!(Budget::new(4000, 500).unwrap().available_tokens(), 3500);
    }

    #[test]
    fn test_analyze_reports_oversized_without_removing() {
        let budget = Budget::try_from(BudgetConfig {
            max_file_size_bytes: 10,
            ..Default::default()
        })
        .unwrap();
        let optimizer = BudgetOptimizer::new(budget);
        let files = vec![
            ReviewFile::new("small.rs", "fn a(){}"),
            ReviewFile::new("big.rs", "x".repeat(100)),
        ];

        let analysis = optimizer.analyze(&files);
        assert_eq!(analysis.per_file.len(), 2);
        assert_eq!(analysis.oversized_files, vec!["big.rs".to_string()]);
        assert_eq!(analysis.total_size_bytes, 108);
        assert_eq!(analysis.total_tokens, 2 + 25);
    }

    #[test]
    fn test_check_limits_within() {
        let optimizer = optimizer(4000, 500);
        let files = vec![ReviewFile::new("a.rs", content_with_tokens(3500))];
        let check = optimizer.check_limits(&files);
        assert!(check.within_limits);
        assert_eq!(check.reason, None);
        assert_eq!(check.available_tokens, 3500);
        assert!((check.utilization - 1.0).abs() < 1e-9);
        assert!(check.clone().into_result().is_ok());
    }

    #[test]
    fn test_check_limits_token_limit_exceeded() {
        let optimizer = optimizer(4000, 500);
        let files = vec![ReviewFile::new("a.rs", content_with_tokens(5000))];
        let check = optimizer.check_limits(&files);

        assert!(!check.within_limits);
        assert_eq!(check.reason, Some(LimitReason::TokenLimitExceeded));
        assert_eq!(check.used_tokens, 5000);
        assert_eq!(check.recommendations.len(), 1);
        assert!(check.recommendations[0].contains("5000"));
        assert!(check.recommendations[0].contains("3500"));

        let err = check.into_result().unwrap_err();
        assert!(matches!(
            err,
            ReviewError::Budget {
                reason: LimitReason::TokenLimitExceeded,
                measured: 5000,
                allowed: 3500,
                ..
            }
        ));
    }

    #[test]
    fn test_check_limits_order_oversized_first() {
        let budget = Budget::try_from(BudgetConfig {
            max_tokens: 100,
            reserved_tokens: 10,
            max_file_size_bytes: 50,
            max_total_size_bytes: 60,
            ..Default::default()
        })
        .unwrap();
        let optimizer = BudgetOptimizer::new(budget);
        // Oversized, over total size and over tokens at once
        let files = vec![ReviewFile::new("a.rs", "z".repeat(1000))];
        let check = optimizer.check_limits(&files);
        assert_eq!(check.reason, Some(LimitReason::OversizedFiles));
        assert!(check.recommendations[0].contains("a.rs"));
        assert_eq!(check.measured, 1000);
        assert_eq!(check.allowed, 50);
    }

    #[test]
    fn test_check_limits_total_size() {
        let budget = Budget::try_from(BudgetConfig {
            max_file_size_bytes: 100,
            max_total_size_bytes: 150,
            ..Default::default()
        })
        .unwrap();
        let optimizer = BudgetOptimizer::new(budget);
        let files = vec![
            ReviewFile::new("a.rs", "a".repeat(80)),
            ReviewFile::new("b.rs", "b".repeat(80)),
        ];
        let check = optimizer.check_limits(&files);
        assert_eq!(check.reason, Some(LimitReason::SizeLimitExceeded));
        assert!(check.recommendations[0].contains("160"));
        assert!(check.recommendations[0].contains("150"));
    }

    #[test]
    fn test_importance_heuristics() {
        let plain = ReviewFile::new("src/auth.rs", "");
        let test = ReviewFile::new("tests/auth_test.rs", "");
        let vendored = ReviewFile::new("vendor/lib/auth.js", "");
        let big = ReviewFile::new("src/big.rs", "x".repeat(100_000));

        assert!((importance_score(&plain) - 1.0).abs() < 1e-9);
        assert!((importance_score(&test) - 0.8).abs() < 1e-9);
        assert!((importance_score(&vendored) - 0.6).abs() < 1e-9);
        assert!((importance_score(&big) - 0.7).abs() < 1e-9);

        assert!(is_test_path("src/widget.spec.ts"));
        assert!(is_test_path("pkg/test_utils.py"));
        assert!(!is_test_path("src/contest.rs"));
        assert!(is_generated_path("web/app.min.js"));
        assert!(is_generated_path("node_modules/x/index.js"));
        assert!(!is_generated_path("src/builder.rs"));
    }

    #[test]
    fn test_optimize_filters_patterns() {
        let optimizer = optimizer(4000, 500);
        let files = vec![
            ReviewFile::new("src/a.rs", "fn a() {}"),
            ReviewFile::new("docs/readme.md", "# hi"),
            ReviewFile::new("src/generated/b.rs", "fn b() {}"),
        ];
        let options = OptimizeOptions {
            include_patterns: vec!["src/".to_string()],
            exclude_patterns: vec!["generated".to_string()],
            ..Default::default()
        };

        let result = optimizer.optimize(&files, &options);
        let paths: Vec<_> = result.optimized.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.rs"]);
        assert_eq!(result.excluded.len(), 2);
        assert!(
            result
                .excluded
                .iter()
                .all(|e| e.reason == ExclusionReason::Filtered)
        );
    }

    #[test]
    fn test_optimize_sorts_by_importance_with_stable_ties() {
        let optimizer = optimizer(100_000, 1);
        let files = vec![
            ReviewFile::new("tests/a.rs", "x"),
            ReviewFile::new("src/first.rs", "x"),
            ReviewFile::new("src/second.rs", "x"),
        ];
        let result = optimizer.optimize(&files, &OptimizeOptions::default());
        let paths: Vec<_> = result.optimized.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/first.rs", "src/second.rs", "tests/a.rs"]);
        assert!(!result.optimization_applied);
    }

    #[test]
    fn test_optimize_excludes_file_that_cannot_fit_without_truncation() {
        let optimizer = optimizer(4000, 500);
        let files = vec![
            ReviewFile::new("a.rs", content_with_tokens(100)),
            ReviewFile::new("b.rs", content_with_tokens(4000)),
            ReviewFile::new("c.rs", content_with_tokens(50)),
        ];

        let result = optimizer.optimize(&files, &OptimizeOptions::default());
        assert_eq!(result.optimized.len(), 2);
        assert_eq!(result.excluded.len(), 1);
        assert_eq!(result.excluded[0].path, "b.rs");
        assert_eq!(result.excluded[0].reason, ExclusionReason::DoesNotFit);
        assert!(!result.optimization_applied);
        assert_eq!(result.total_tokens, 150);
    }

    #[test]
    fn test_optimize_truncates_with_per_file_cap() {
        let optimizer = optimizer(4000, 500);
        let files = vec![
            ReviewFile::new("a.rs", content_with_tokens(100)),
            ReviewFile::new("b.rs", content_with_tokens(4000)),
            ReviewFile::new("c.rs", content_with_tokens(50)),
        ];
        let options = OptimizeOptions {
            max_tokens_per_file: Some(3000),
            ..Default::default()
        };

        let result = optimizer.optimize(&files, &options);
        assert_eq!(result.optimized.len(), 3);
        assert!(result.excluded.is_empty());
        assert!(result.optimization_applied);
        assert!(result.total_tokens <= 3500);

        let truncated = result.optimized.iter().find(|f| f.path == "b.rs").unwrap();
        assert!(truncated.truncated);
        assert!(truncated.text().ends_with(budget_constants::TRUNCATION_MARKER));
        assert!(optimizer.budget().estimator().count(truncated.text()) <= 3000);
        // The caller's file is untouched
        assert_eq!(files[1].text().len(), 16_000);
    }

    #[test]
    fn test_optimize_marks_budget_exhausted() {
        let optimizer = optimizer(200, 100);
        let files = vec![
            ReviewFile::new("a.rs", content_with_tokens(100)),
            ReviewFile::new("tests/b.rs", content_with_tokens(10)),
        ];
        let result = optimizer.optimize(&files, &OptimizeOptions::default());
        assert_eq!(result.optimized.len(), 1);
        assert_eq!(result.optimized[0].path, "a.rs");
        assert_eq!(result.excluded[0].reason, ExclusionReason::BudgetExhausted);
    }

    #[test]
    fn test_optimize_drops_duplicate_paths() {
        let optimizer = optimizer(4000, 500);
        let files = vec![
            ReviewFile::new("a.rs", "one"),
            ReviewFile::new("a.rs", "two"),
        ];
        let result = optimizer.optimize(&files, &OptimizeOptions::default());
        assert_eq!(result.optimized.len(), 1);
        assert_eq!(result.optimized[0].text(), "one");
        assert!(result.excluded.is_empty());
    }

    #[test]
    fn test_truncate_short_content_is_unchanged() {
        let optimizer = optimizer(4000, 500);
        assert_eq!(
            optimizer.truncate("fn main() {}\n", 100),
            Truncation::Unchanged
        );
    }

    #[test]
    fn test_truncate_keeps_whole_lines() {
        let optimizer = optimizer(4000, 500);
        let content = "aaaa\n".repeat(100); // 500 chars, 125 tokens
        match optimizer.truncate(&content, 40) {
            Truncation::Truncated { content, tokens } => {
                assert!(tokens <= 40);
                let body = content
                    .strip_suffix(budget_constants::TRUNCATION_MARKER)
                    .unwrap();
                assert!(body.lines().all(|l| l == "aaaa"));
                assert!(!body.is_empty());
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn test_truncate_first_line_too_long() {
        let optimizer = optimizer(4000, 500);
        let content = format!("{}\nshort\n", "x".repeat(1000));
        assert_eq!(
            optimizer.truncate(&content, 50),
            Truncation::CannotTruncate
        );
    }

    #[test]
    fn test_truncate_reserves_marker_within_limit() {
        let optimizer = optimizer(4000, 500);
        // Two 15-token lines; the marker costs 10 tokens
        let line = format!("{}\n", "x".repeat(59));
        let content = line.repeat(2);
        assert_eq!(
            optimizer
                .budget()
                .estimator()
                .count(budget_constants::TRUNCATION_MARKER),
            10
        );

        assert_eq!(optimizer.truncate(&content, 20), Truncation::CannotTruncate);
        match optimizer.truncate(&content, 25) {
            Truncation::Truncated { content, tokens } => {
                assert_eq!(tokens, 25);
                assert!(content.starts_with(&line));
                assert!(content.ends_with(budget_constants::TRUNCATION_MARKER));
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_check_limits_within_when_everything_fits(
            lens in prop::collection::vec(0usize..2_000, 0..10),
        ) {
            let optimizer = optimizer(4000, 500);
            let files: Vec<ReviewFile> = lens
                .iter()
                .enumerate()
                .map(|(i, len)| ReviewFile::new(format!("src/f{i}.rs"), "y".repeat(*len)))
                .collect();
            let tokens: u64 = lens.iter().map(|len| (*len as u64).div_ceil(4)).sum();

            let check = optimizer.check_limits(&files);
            prop_assert_eq!(check.used_tokens, tokens);
            prop_assert_eq!(check.available_tokens, 3500);
            // Sizes stay far below the byte limits, so only tokens decide
            prop_assert_eq!(check.within_limits, tokens <= 3500);
            if check.within_limits {
                prop_assert_eq!(check.reason, None);
                prop_assert!(check.utilization <= 1.0);
            } else {
                prop_assert_eq!(check.reason, Some(LimitReason::TokenLimitExceeded));
            }
        }

        #[test]
        fn prop_optimize_partitions_input(
            entries in prop::collection::vec((0u8..8, 0usize..3000), 0..12),
            cap in prop::option::of(1u64..800),
        ) {
            let optimizer = optimizer(1200, 200);
            let files: Vec<ReviewFile> = entries
                .iter()
                .map(|(id, len)| ReviewFile::new(format!("src/f{id}.rs"), "abc\n".repeat(len / 4)))
                .collect();
            let options = OptimizeOptions { max_tokens_per_file: cap, ..Default::default() };
            let result = optimizer.optimize(&files, &options);

            let included: HashSet<_> = result.optimized.iter().map(|f| f.path.clone()).collect();
            let excluded: HashSet<_> = result.excluded.iter().map(|f| f.path.clone()).collect();
            let input: HashSet<_> = files.iter().map(|f| f.path.clone()).collect();

            prop_assert!(included.is_disjoint(&excluded));
            prop_assert!(included.is_subset(&input));
            prop_assert!(excluded.is_subset(&input));
            prop_assert_eq!(included.len(), result.optimized.len());
            prop_assert!(result.total_tokens <= 1000);
        }
    }
}
