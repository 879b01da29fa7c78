//! # Name Check Library
//!
//! Concurrent availability checking for game account names against the
//! RuneScape hiscores, with durable progress between runs.
//!
//! A run validates comma-separated input, skips names an earlier run already
//! resolved, looks the rest up on a bounded pool of workers and records
//! every answer in a JSON progress file. Failed lookups are retried on the
//! next run; a cancellation token stops a run early without waiting on
//! lookups that are still in flight.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use name_check_lib::{CheckConfig, NameChecker, NoopObserver, Source};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CheckConfig::default().with_source(Source::Osrs).with_workers(5);
//!     let checker = NameChecker::with_config(config)?;
//!     let report = checker
//!         .run("Zezima,ab", CancellationToken::new(), &NoopObserver)
//!         .await;
//!
//!     for result in &report.results {
//!         println!("{}: {:?}", result.name, result.available);
//!     }
//!     Ok(())
//! }
//! ```

// Re-export main public API types and functions
pub use aggregate::{summarize, ResultAggregator};
pub use checker::{checker_for, AvailabilityChecker, NameChecker};
pub use concurrent::{Dispatcher, NoopObserver, RunObserver};
pub use config::{
    env_config_from, load_env_config, parse_duration, ConfigManager, DefaultsConfig, EnvConfig,
    FileConfig,
};
pub use error::NameCheckError;
pub use protocols::{default_endpoint, HiscoreClient};
pub use store::{ProgressStore, SNAPSHOT_VERSION};
pub use types::{
    truncate_message, CheckConfig, NameRecord, NameStatus, Outcome, RejectReason, Rejection,
    RunEnd, RunReport, RunResult, RunStatus, RunSummary, Source, MAX_ERROR_LEN, MAX_WORKERS,
    MIN_WORKERS,
};
pub use validate::{names_from_text, validate_name, validate_names, Validation, MAX_NAME_LEN};

// Internal modules - these are not part of the public API
mod aggregate;
mod checker;
mod concurrent;
mod config;
mod error;
mod protocols;
mod store;
mod types;
mod validate;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, NameCheckError>;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
