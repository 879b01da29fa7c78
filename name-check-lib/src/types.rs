//! Core data types for name availability checking.
//!
//! This module defines the data structures shared by the validator, the
//! progress store, the dispatcher and reporting code: persisted records,
//! per-run results, provider outcomes and the run configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::NameCheckError;

/// Lowest accepted worker count.
pub const MIN_WORKERS: usize = 1;
/// Highest accepted worker count.
pub const MAX_WORKERS: usize = 10;
/// Upper bound on stored/logged provider error messages, in characters.
pub const MAX_ERROR_LEN: usize = 50;

/// Which hiscore lookup a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Old School RuneScape hiscores
    #[default]
    Osrs,
    /// RuneScape 3 hiscores
    Rs3,
}

impl Source {
    /// Every provider this build knows about.
    pub const ALL: [Source; 2] = [Source::Osrs, Source::Rs3];

    /// Human readable provider name, also written to `NameRecord::source`.
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Osrs => "OSRS Hiscores",
            Source::Rs3 => "RS3 Hiscores",
        }
    }

    /// Short selector accepted on the command line and in config files.
    pub fn key(&self) -> &'static str {
        match self {
            Source::Osrs => "osrs",
            Source::Rs3 => "rs3",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Source {
    type Err = NameCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Source::ALL
            .into_iter()
            .find(|source| {
                source.key().eq_ignore_ascii_case(wanted)
                    || source.display_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| {
                NameCheckError::config(format!(
                    "Unknown source '{}'. Use one of: osrs, rs3",
                    wanted
                ))
            })
    }
}

/// Persisted status of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameStatus {
    /// Submitted but never completed
    Pending,
    /// A provider gave a definite answer; skipped by later runs
    Checked,
    /// The last attempt failed; retried by later runs
    Error,
}

/// Durable status entry for one name, owned by the progress store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameRecord {
    /// Trimmed name, unique key of the store. Not serialized: the
    /// snapshot already keys records by name.
    #[serde(skip)]
    pub name: String,

    pub status: NameStatus,

    /// Only meaningful for `Checked`
    pub available: Option<bool>,

    /// Provider that produced this record
    pub source: String,

    /// Time of the last status change
    pub timestamp: DateTime<Utc>,

    /// Truncated diagnostic, only meaningful for `Error`
    pub error: Option<String>,
}

impl NameRecord {
    /// A definite answer from a provider.
    pub fn checked<N: Into<String>, S: Into<String>>(name: N, source: S, available: bool) -> Self {
        Self {
            name: name.into(),
            status: NameStatus::Checked,
            available: Some(available),
            source: source.into(),
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// A failed attempt; availability stays unknown.
    pub fn error<N: Into<String>, S: Into<String>, M: AsRef<str>>(
        name: N,
        source: S,
        message: M,
    ) -> Self {
        Self {
            name: name.into(),
            status: NameStatus::Error,
            available: None,
            source: source.into(),
            timestamp: Utc::now(),
            error: Some(truncate_message(message.as_ref())),
        }
    }

    /// Whether later runs should leave this name alone.
    pub fn is_resolved(&self) -> bool {
        self.status == NameStatus::Checked
    }

    /// Whether the fields agree with the status: a checked record carries
    /// an answer and no error, anything else carries no answer.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            NameStatus::Checked => self.available.is_some() && self.error.is_none(),
            NameStatus::Error | NameStatus::Pending => self.available.is_none(),
        }
    }
}

/// Three-way result of a single provider lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The name has a hiscore entry
    Taken,
    /// The provider does not know the name
    Available,
    /// Anything else; the message is already truncated
    ProviderError(String),
}

impl Outcome {
    /// Build a provider error, truncating the message.
    pub fn error<M: AsRef<str>>(message: M) -> Self {
        Outcome::ProviderError(truncate_message(message.as_ref()))
    }
}

/// Status of a name within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Checked,
    Error,
    /// Stopped before the provider answered; never persisted
    Cancelled,
}

/// Ephemeral outcome for one name in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub name: String,
    pub source: String,
    pub available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: RunStatus,
}

impl RunResult {
    /// Translate a provider outcome for `name`.
    pub fn from_outcome(name: &str, source: &str, outcome: Outcome) -> Self {
        let (status, available, error) = match outcome {
            Outcome::Taken => (RunStatus::Checked, Some(false), None),
            Outcome::Available => (RunStatus::Checked, Some(true), None),
            Outcome::ProviderError(message) => (RunStatus::Error, None, Some(message)),
        };
        Self {
            name: name.to_string(),
            source: source.to_string(),
            available,
            error,
            status,
        }
    }

    pub fn cancelled(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            available: None,
            error: None,
            status: RunStatus::Cancelled,
        }
    }

    /// Projection into the progress store; cancelled results are not stored.
    pub fn to_record(&self) -> Option<NameRecord> {
        match self.status {
            RunStatus::Checked => Some(NameRecord::checked(
                self.name.clone(),
                self.source.clone(),
                self.available.unwrap_or(false),
            )),
            RunStatus::Error => Some(NameRecord::error(
                self.name.clone(),
                self.source.clone(),
                self.error.as_deref().unwrap_or("unknown error"),
            )),
            RunStatus::Cancelled => None,
        }
    }
}

/// Counters handed to reporting code at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Names with a definite answer
    pub checked: usize,
    /// Subset of `checked` that is free
    pub available: usize,
    /// Names whose lookup failed
    pub errors: usize,
    /// All results recorded this run
    pub total: usize,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunEnd {
    Completed,
    Stopped,
}

/// Why the validator dropped a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    InvalidLength,
    InvalidCharacters,
    OnlySpecialCharacters,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::InvalidLength => write!(f, "must be 1-12 characters"),
            RejectReason::InvalidCharacters => write!(f, "has invalid characters"),
            RejectReason::OnlySpecialCharacters => {
                write!(f, "is only special characters or spaces")
            }
        }
    }
}

/// A token the validator refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub token: String,
    pub reason: RejectReason,
}

/// Everything a run hands back to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub end: RunEnd,
    pub summary: RunSummary,
    /// Completed results in completion order
    pub results: Vec<RunResult>,
    /// Tokens refused by the validator
    pub rejected: Vec<Rejection>,
    /// Names skipped because an earlier run already resolved them
    pub skipped: Vec<String>,
}

/// Configuration options for a checking run.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Concurrent lookups. Default: 5, Range: 1-10
    pub workers: usize,

    /// Provider used when the caller does not pick one
    pub source: Source,

    /// Pause applied by every task before its lookup. Default: 100ms
    pub rate_limit_delay: Duration,

    /// HTTP timeout for a single lookup. Default: 10 seconds
    pub timeout: Duration,

    /// Where the progress snapshot lives. Default: `progress.json`
    pub progress_file: PathBuf,

    /// Completions between periodic snapshots. Default: 10
    pub snapshot_interval: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            source: Source::Osrs,
            rate_limit_delay: Duration::from_millis(100),
            timeout: Duration::from_secs(10),
            progress_file: PathBuf::from("progress.json"),
            snapshot_interval: 10,
        }
    }
}

impl CheckConfig {
    /// Set the worker count, clamped to 1-10.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.clamp(MIN_WORKERS, MAX_WORKERS);
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    pub fn with_progress_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.progress_file = path.into();
        self
    }

    /// Set the snapshot cadence; zero is treated as one.
    pub fn with_snapshot_interval(mut self, every: usize) -> Self {
        self.snapshot_interval = every.max(1);
        self
    }
}

/// Cut a diagnostic down to [`MAX_ERROR_LEN`] characters.
pub fn truncate_message(message: &str) -> String {
    message.chars().take(MAX_ERROR_LEN).collect()
}
