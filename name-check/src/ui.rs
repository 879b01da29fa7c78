//! Console display logic for the name-check CLI.
//!
//! Result lines go to stdout as they complete; run events (skips,
//! rejections, start and stop) go to stderr so `--json` output stays clean.
//! Colors are only applied in `--pretty` mode.

use console::{pad_str, style, Alignment, Term};
use name_check_lib::{
    default_endpoint, CheckConfig, Rejection, RunEnd, RunObserver, RunReport, RunResult,
    RunStatus, RunSummary, Source,
};
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;

const NAME_WIDTH: usize = 14;

// ── Observer ─────────────────────────────────────────────────────────────────

/// Prints results as they arrive.
///
/// The dispatcher reports a result before it reports the new progress count,
/// so the result is parked until `on_progress` supplies the `[n/total]` prefix.
pub struct ConsoleObserver {
    pretty: bool,
    quiet: bool,
    parked: Mutex<Option<RunResult>>,
    stderr: Term,
}

impl ConsoleObserver {
    /// `quiet` suppresses per-result lines (used for `--json`).
    pub fn new(pretty: bool, quiet: bool) -> Self {
        Self {
            pretty,
            quiet,
            parked: Mutex::new(None),
            stderr: Term::stderr(),
        }
    }
}

impl RunObserver for ConsoleObserver {
    fn on_progress(&self, completed: usize, total: usize) {
        let parked = match self.parked.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(result) = parked {
            if !self.quiet {
                println!(
                    "{}",
                    format_result_line(&result, Some((completed, total)), self.pretty)
                );
            }
        }
    }

    fn on_log(&self, message: &str) {
        let line = if self.pretty {
            style(message).dim().to_string()
        } else {
            message.to_string()
        };
        let _ = self.stderr.write_line(&line);
    }

    fn on_result(&self, result: &RunResult) {
        match self.parked.lock() {
            Ok(mut slot) => *slot = Some(result.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(result.clone()),
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a pretty run.
pub fn print_header(name_count: usize, config: &CheckConfig) {
    println!(
        "{} {} {}",
        style("name-check").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "- Checking {} name{}",
            name_count,
            plural(name_count)
        ))
        .dim(),
    );
    println!(
        "{}",
        style(format!(
            "Source: {} | Workers: {} | Delay: {}ms",
            config.source.display_name(),
            config.workers,
            config.rate_limit_delay.as_millis()
        ))
        .dim()
    );
    println!();
}

// ── Result lines ─────────────────────────────────────────────────────────────

/// Word shown for a result.
pub fn status_label(result: &RunResult) -> &'static str {
    match (result.status, result.available) {
        (RunStatus::Checked, Some(true)) => "AVAILABLE",
        (RunStatus::Checked, _) => "TAKEN",
        (RunStatus::Error, _) => "ERROR",
        (RunStatus::Cancelled, _) => "CANCELLED",
    }
}

/// `[3/8] name  AVAILABLE`, with the error text appended for failures.
pub fn format_result_line(
    result: &RunResult,
    counter: Option<(usize, usize)>,
    pretty: bool,
) -> String {
    let prefix = match counter {
        Some((current, total)) => format!("[{}/{}] ", current, total),
        None => String::new(),
    };
    let label = status_label(result);
    let reason = result
        .error
        .as_deref()
        .map(|e| format!("  ({})", e))
        .unwrap_or_default();

    if !pretty {
        return format!("{}{}  {}{}", prefix, result.name, label, reason);
    }

    let padded = pad_str(&result.name, NAME_WIDTH, Alignment::Left, None);
    let label = match label {
        "AVAILABLE" => style(label).green().bold(),
        "TAKEN" => style(label).red().bold(),
        _ => style(label).yellow(),
    };
    format!(
        "  {}{}  {}{}",
        style(prefix).dim(),
        style(padded).white(),
        label,
        style(reason).dim()
    )
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// `5 checked in 1.2s | 2 available | 3 taken | 1 error`
pub fn format_summary(summary: &RunSummary, duration: Duration) -> String {
    let taken = summary.checked - summary.available;
    format!(
        "{} checked in {:.1}s | {} available | {} taken | {} error{}",
        summary.checked,
        duration.as_secs_f64(),
        summary.available,
        taken,
        summary.errors,
        plural(summary.errors),
    )
}

/// Print the closing summary and, for stopped runs, how far the run got.
pub fn print_summary(report: &RunReport, duration: Duration, pretty: bool) {
    let line = format_summary(&report.summary, duration);
    println!();
    if pretty {
        println!(
            "  {}",
            style("────────────────────────────────────────────────────").dim()
        );
        println!("  {}", style(line).bold());
    } else {
        println!("{}", line);
    }

    if report.end == RunEnd::Stopped {
        let note = "Stopped early; unchecked names will be retried on the next run";
        if pretty {
            println!("  {}", style(note).yellow());
        } else {
            println!("{}", note);
        }
    }

    let available: Vec<&str> = report
        .results
        .iter()
        .filter(|r| r.available == Some(true))
        .map(|r| r.name.as_str())
        .collect();
    if pretty && !available.is_empty() {
        println!(
            "  {} {}",
            style("Available:").green().bold(),
            available.join(", ")
        );
    }
}

/// Print rejected tokens with their reason to stderr.
pub fn print_rejections(rejected: &[Rejection]) {
    for rejection in rejected {
        eprintln!("[validation] {} {}", rejection.token, rejection.reason);
    }
}

// ── JSON ─────────────────────────────────────────────────────────────────────

pub fn print_json_report(report: &RunReport) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// What a `--dry-run` would do.
#[derive(Debug, Serialize)]
pub struct DryRunPlan<'a> {
    pub submit: &'a [String],
    pub skipped: &'a [String],
    pub rejected: &'a [Rejection],
}

/// Print the dry-run plan as text or JSON.
pub fn print_dry_run(plan: &DryRunPlan<'_>, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }

    for name in plan.submit {
        println!("{}", name);
    }
    for name in plan.skipped {
        println!("{}  (already checked)", name);
    }
    for rejection in plan.rejected {
        println!("{}  (rejected: {})", rejection.token, rejection.reason);
    }
    eprintln!(
        "{} to check, {} already checked, {} rejected",
        plan.submit.len(),
        plan.skipped.len(),
        plan.rejected.len()
    );
    Ok(())
}

// ── Sources ──────────────────────────────────────────────────────────────────

/// Print every lookup source, then exit.
pub fn print_sources() {
    let heading = console::Style::new().yellow().bold();
    let key_style = console::Style::new().green().bold();

    println!();
    println!("{}", heading.apply_to("Available Sources:"));
    println!();
    for source in Source::ALL {
        println!(
            "  {} {}  {}",
            key_style.apply_to(format!("{:<6}", source.key())),
            source.display_name(),
            style(default_endpoint(source)).dim(),
        );
    }
    println!();
    println!("Use: name-check <names> --source <source>");
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
