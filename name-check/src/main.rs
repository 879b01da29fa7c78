//! Name Check CLI Application
//!
//! A command-line interface for checking RuneScape name availability against
//! the official hiscores. Progress is kept in a JSON file so interrupted or
//! partially failed runs pick up where they left off.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use name_check_lib::{
    load_env_config, names_from_text, validate_names, CheckConfig, ConfigManager, FileConfig,
    NameCheckError, NameChecker, RunEnd, Source, MAX_WORKERS, MIN_WORKERS,
};
use std::process;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Exit code for a run stopped by Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for name-check
#[derive(Parser, Debug)]
#[command(name = "name-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check RuneScape name availability against the official hiscores")]
#[command(
    long_about = "Check RuneScape name availability against the official hiscores.\n\nNames that already have a confirmed answer in the progress file are skipped; failed lookups are retried on the next run. Press Ctrl-C to stop early."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Names to check (comma-separated or separate arguments)
    #[arg(value_name = "NAMES", help_heading = "Name Selection")]
    pub names: Vec<String>,

    /// Input file with names (one per line or comma-separated)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Name Selection"
    )]
    pub file: Option<String>,

    /// Hiscores to check against: osrs or rs3 (default: osrs)
    #[arg(
        short = 's',
        long = "source",
        value_name = "SOURCE",
        help_heading = "Name Selection"
    )]
    pub source: Option<String>,

    /// List the available sources and exit
    #[arg(long = "list-sources", help_heading = "Name Selection")]
    pub list_sources: bool,

    /// Validate input and show what would be checked, without any lookups
    #[arg(long = "dry-run", help_heading = "Name Selection")]
    pub dry_run: bool,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Colored output with a header and summary
    #[arg(short = 'p', long = "pretty", help_heading = "Output Format")]
    pub pretty: bool,

    /// Concurrent lookups (default: 5, range: 1-10)
    #[arg(
        short = 'w',
        long = "workers",
        value_name = "N",
        help_heading = "Performance"
    )]
    pub workers: Option<usize>,

    /// Progress file (default: progress.json)
    #[arg(
        long = "progress-file",
        value_name = "PATH",
        help_heading = "Progress"
    )]
    pub progress_file: Option<String>,

    /// Forget all saved progress before running
    #[arg(long = "clear-progress", help_heading = "Progress")]
    pub clear_progress: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show debug logging
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

impl Args {
    fn has_input(&self) -> bool {
        !self.names.is_empty() || self.file.is_some()
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args);

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if args.list_sources {
        ui::print_sources();
        return;
    }

    match run_name_check(args).await {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over the CLI flags.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if args.debug {
            "debug"
        } else if args.verbose {
            "info"
        } else {
            "warn"
        };
        EnvFilter::new(format!(
            "warn,name_check={0},name_check_lib={0}",
            level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if args.list_sources {
        return Ok(());
    }

    // --clear-progress on its own is a complete command
    if !args.has_input() && !args.clear_progress {
        return Err("You must specify names or a file with --file".to_string());
    }

    if let Some(workers) = args.workers {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(format!(
                "Workers must be between {} and {}",
                MIN_WORKERS, MAX_WORKERS
            ));
        }
    }

    if let Some(source) = &args.source {
        source.parse::<Source>().map_err(|e| e.to_string())?;
    }

    if matches!(&args.progress_file, Some(path) if path.trim().is_empty()) {
        return Err("--progress-file cannot be empty".to_string());
    }

    Ok(())
}

/// Main name checking logic. Returns the process exit code.
async fn run_name_check(args: Args) -> Result<i32, Box<dyn std::error::Error>> {
    let config = build_config(&args)?;
    debug!(?config, "resolved configuration");

    let checker = NameChecker::with_config(config)?;

    if args.clear_progress {
        checker.clear_progress()?;
        eprintln!("Cleared progress in {}", checker.store().path().display());
        if !args.has_input() {
            return Ok(0);
        }
    }

    let raw = collect_input(&args).await?;
    let validation = validate_names(&raw);
    if validation.accepted.is_empty() {
        ui::print_rejections(&validation.rejected);
        return Err("No valid names to check".into());
    }

    if args.dry_run {
        let (submit, skipped) = checker.dispatcher().plan(&validation.accepted);
        let plan = ui::DryRunPlan {
            submit: &submit,
            skipped: &skipped,
            rejected: &validation.rejected,
        };
        ui::print_dry_run(&plan, args.json)?;
        return Ok(0);
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    if args.pretty && !args.json {
        ui::print_header(validation.accepted.len(), checker.config());
    }

    let observer = ui::ConsoleObserver::new(args.pretty, args.json);
    let started = Instant::now();
    let report = checker.run(&raw, cancel, &observer).await;

    if args.json {
        ui::print_json_report(&report)?;
    } else {
        ui::print_summary(&report, started.elapsed(), args.pretty);
    }

    Ok(match report.end {
        RunEnd::Completed => 0,
        RunEnd::Stopped => EXIT_INTERRUPTED,
    })
}

/// Cancel `cancel` on the first Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!();
                eprintln!("Stopping...");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "could not listen for Ctrl-C"),
        }
    });
}

/// Build CheckConfig with proper precedence:
/// 1. CLI arguments (highest)
/// 2. Environment variables (NC_*)
/// 3. Config file (--config, NC_CONFIG, or discovered)
/// 4. Built-in defaults
fn build_config(args: &Args) -> Result<CheckConfig, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);
    let env_config = load_env_config();

    let file_config = if let Some(explicit_config_path) = &args.config {
        debug!(path = %explicit_config_path, "using config file from --config");
        load_explicit(&config_manager, explicit_config_path)?
    } else if let Some(env_config_path) = &env_config.config {
        let path = env_config_path.display().to_string();
        debug!(path = %path, "using config file from NC_CONFIG");
        load_explicit(&config_manager, &path)?
    } else {
        config_manager.discover_and_load()?
    };

    let config = file_config.apply_to(CheckConfig::default());
    let config = env_config.apply_to(config);
    apply_cli_args_to_config(config, args)
}

fn load_explicit(manager: &ConfigManager, path: &str) -> Result<FileConfig, String> {
    manager
        .load_file(path)
        .map_err(|e| format!("Failed to load config file '{}': {}", path, e))
}

/// CLI arguments override both environment variables and config file settings.
fn apply_cli_args_to_config(
    mut config: CheckConfig,
    args: &Args,
) -> Result<CheckConfig, Box<dyn std::error::Error>> {
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if let Some(source) = &args.source {
        config = config.with_source(source.parse::<Source>()?);
    }
    if let Some(path) = &args.progress_file {
        config = config.with_progress_file(path);
    }
    Ok(config)
}

/// Positional names joined with commas, followed by the contents of `--file`.
async fn collect_input(args: &Args) -> Result<String, NameCheckError> {
    let mut parts: Vec<String> = args.names.clone();

    if let Some(file_path) = &args.file {
        let text = tokio::fs::read_to_string(file_path)
            .await
            .map_err(|e| NameCheckError::file_error(file_path.as_str(), e.to_string()))?;
        parts.push(names_from_text(&text));
    }

    Ok(parts.join(","))
}
