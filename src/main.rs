use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reviewloom::cli::{OutputFormat, PIPELINE_ERROR_EXIT, ReviewOptions};

#[derive(Parser)]
#[command(name = "reviewloom")]
#[command(version, about = "Budget-aware LLM code review for source trees")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project config file (default: .reviewloom/config.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Review the files under a path
    Review {
        #[arg(default_value = ".", help = "File or directory to review")]
        path: PathBuf,
        #[arg(long, help = "Glob skipped during discovery (repeatable)")]
        exclude: Vec<String>,
        #[arg(long, help = "Only review paths containing this substring (repeatable)")]
        include: Vec<String>,
        #[arg(long, help = "Truncate files to this many tokens instead of dropping them")]
        max_tokens_per_file: Option<u64>,
        #[arg(long, help = "Change title passed to the reviewer")]
        title: Option<String>,
        #[arg(long, help = "Change description passed to the reviewer")]
        description: Option<String>,
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        #[arg(long = "dry-run", help = "Show the budget plan only, don't call the model")]
        dry_run: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mreviewloom encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Default hook prints the backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::from(PIPELINE_ERROR_EXIT)
        }
    }
}

fn run_cli() -> anyhow::Result<u8> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let code = match cli.command {
        Commands::Review {
            path,
            exclude,
            include,
            max_tokens_per_file,
            title,
            description,
            format,
            dry_run,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(reviewloom::cli::commands::review::run(ReviewOptions {
                path,
                config_path: cli.config,
                exclude,
                include,
                max_tokens_per_file,
                title,
                description,
                format,
                dry_run,
                quiet: cli.quiet,
            }))?
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Show { format } => {
                    reviewloom::cli::commands::config::show(cli.config.as_deref(), &format)?;
                }
                ConfigAction::Path => {
                    reviewloom::cli::commands::config::path()?;
                }
            }
            0
        }
    };

    Ok(code)
}
