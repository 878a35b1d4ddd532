//! Review Command
//!
//! Scan a path, fit the files into the token budget and run one review request.
//!
//! Usage:
//!   reviewloom review [PATH] [--exclude GLOB]... [--include PATTERN]...
//!                     [--max-tokens-per-file N] [--format text|json] [--dry-run]

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ai::{Budget, BudgetOptimizer, OptimizeOptions, PromptContext, create_transport};
use crate::analyzer::FileScanner;
use crate::cli::ui::{Output, severity_label, status_label};
use crate::config::{Config, ConfigLoader, ScanConfig};
use crate::pipeline::{ReviewOutcome, ReviewPipeline};
use crate::types::{OverallStatus, Result, ReviewFile};

/// Exit code when the pipeline itself fails (no result produced)
pub const PIPELINE_ERROR_EXIT: u8 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewOptions {
    pub path: PathBuf,
    /// Project config file replacing `.reviewloom/config.toml`
    pub config_path: Option<PathBuf>,
    /// Discovery globs added to `scan.exclude`
    pub exclude: Vec<String>,
    /// Path substrings added to `scan.include_patterns`
    pub include: Vec<String>,
    pub max_tokens_per_file: Option<u64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub format: OutputFormat,
    pub dry_run: bool,
    pub quiet: bool,
}

/// Exit code for a completed review: 0 for PASS/WARNING, 1 for FAIL/ERROR
pub fn exit_code(status: OverallStatus) -> u8 {
    match status {
        OverallStatus::Pass | OverallStatus::Warning => 0,
        OverallStatus::Fail | OverallStatus::Error => 1,
    }
}

pub async fn run(options: ReviewOptions) -> Result<u8> {
    let config = load_config(options.config_path.as_deref())?;
    let output = Output::new(options.quiet || options.format == OutputFormat::Json);

    let files = FileScanner::new(&options.path)
        .with_exclude(&scan_excludes(&config.scan, &options))
        .load()?;
    output.info(&format!(
        "Found {} files under {}",
        files.len(),
        options.path.display()
    ));

    let optimize = optimize_options(&config.scan, &options);

    if options.dry_run {
        let budget = Budget::try_from(&config.budget)?;
        print_plan(&BudgetOptimizer::new(budget), &files, &optimize, options.format)?;
        return Ok(0);
    }

    let transport = create_transport(&config.llm)?;
    debug!(transport = transport.name(), model = %config.llm.model, "Transport ready");
    let pipeline = ReviewPipeline::from_config(&config, transport)?.with_options(optimize);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let context = PromptContext {
        title: options.title.clone(),
        description: options.description.clone(),
        instructions: Vec::new(),
    };
    let outcome = pipeline.run(&files, &context, &cancel).await?;

    match options.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => print_outcome(&outcome, &output),
    }

    Ok(exit_code(outcome.result.overall_status()))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_with_project(path),
        None => ConfigLoader::load(),
    }
}

fn scan_excludes(scan: &ScanConfig, options: &ReviewOptions) -> Vec<String> {
    let mut exclude = scan.exclude.clone();
    exclude.extend(options.exclude.iter().cloned());
    exclude
}

fn optimize_options(scan: &ScanConfig, options: &ReviewOptions) -> OptimizeOptions {
    let mut optimize = OptimizeOptions::from(scan);
    optimize
        .include_patterns
        .extend(options.include.iter().cloned());
    if options.max_tokens_per_file.is_some() {
        optimize.max_tokens_per_file = options.max_tokens_per_file;
    }
    optimize
}

fn print_plan(
    optimizer: &BudgetOptimizer,
    files: &[ReviewFile],
    options: &OptimizeOptions,
    format: OutputFormat,
) -> Result<()> {
    let optimization = optimizer.optimize(files, options);
    let analysis = optimizer.analyze(&optimization.optimized);
    let check = optimizer.check_limits(&optimization.optimized);

    if format == OutputFormat::Json {
        let plan = serde_json::json!({
            "candidates": files.len(),
            "selected": optimization.optimized.iter().map(|f| {
                serde_json::json!({ "path": f.path, "truncated": f.truncated })
            }).collect::<Vec<_>>(),
            "excluded": optimization.excluded,
            "totalTokens": analysis.total_tokens,
            "totalSizeBytes": analysis.total_size_bytes,
            "estimatedCost": analysis.estimated_cost,
            "limits": {
                "withinLimits": check.within_limits,
                "reason": check.reason.map(|r| r.as_str()),
                "availableTokens": check.available_tokens,
                "usedTokens": check.used_tokens,
                "utilization": check.utilization,
                "recommendations": check.recommendations,
            }
        });
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let output = Output::default();
    output.header("Review plan (dry run)");

    output.section(&format!("Selected ({})", optimization.optimized.len()));
    for (file, tokens) in optimization.optimized.iter().zip(&analysis.per_file) {
        let marker = if file.truncated { " (truncated)" } else { "" };
        println!("  {:>7} tok  {}{}", tokens.tokens, file.path, marker);
    }

    if !optimization.excluded.is_empty() {
        output.section(&format!("Excluded ({})", optimization.excluded.len()));
        for excluded in &optimization.excluded {
            println!(
                "  {:>7} tok  {}  [{}]",
                excluded.tokens,
                excluded.path,
                excluded.reason.as_str()
            );
        }
    }

    output.section("Budget");
    println!(
        "  Tokens:      {} / {} ({:.1}%)",
        check.used_tokens,
        check.available_tokens,
        check.utilization * 100.0
    );
    println!("  Size:        {} bytes", analysis.total_size_bytes);
    println!("  Est. cost:   ${:.4}", analysis.estimated_cost);
    println!();

    if check.within_limits {
        output.success("Within limits");
    } else {
        let reason = check.reason.map(|r| r.as_str()).unwrap_or("unknown");
        output.warning(&format!(
            "Limit check failed ({}): {} > {}",
            reason, check.measured, check.allowed
        ));
    }
    for recommendation in &check.recommendations {
        println!("  - {}", recommendation);
    }

    Ok(())
}

fn print_outcome(outcome: &ReviewOutcome, output: &Output) {
    let result = &outcome.result;

    output.header(&format!(
        "Review {}",
        status_label(result.overall_status())
    ));
    println!(
        "  Files: {} reviewed, {} truncated, {} excluded",
        outcome.files_reviewed.len(),
        outcome.files_truncated.len(),
        outcome.excluded.len()
    );

    if let Some(error) = &result.parse_error {
        output.error(&format!("Response rejected: {}", error));
    }

    if !result.issues.is_empty() {
        output.section(&format!("Issues ({})", result.issues.len()));
        for issue in &result.issues {
            println!(
                "  [{}] {} {}:{} {}",
                severity_label(issue.severity),
                issue.category,
                issue.file,
                issue.line,
                issue.title
            );
            if !issue.description.is_empty() {
                println!("      {}", issue.description);
            }
            if let Some(fix) = &issue.recommendation {
                println!("      → {}", fix);
            }
        }
    }

    let recommendations = &result.recommendations;
    if !recommendations.immediate.is_empty() || !recommendations.long_term.is_empty() {
        output.section("Recommendations");
        for item in &recommendations.immediate {
            println!("  now:   {}", item);
        }
        for item in &recommendations.long_term {
            println!("  later: {}", item);
        }
    }

    let usage = &result.usage;
    println!();
    println!(
        "  Tokens: {} in / {} out{}  Cost: ${:.4}  Attempts: {}  Time: {}ms",
        usage.input_tokens,
        usage.output_tokens,
        if usage.estimated { " (est.)" } else { "" },
        outcome.estimated_cost,
        outcome.attempts,
        outcome.elapsed_ms
    );
}
