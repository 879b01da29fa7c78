//! Availability checking capability and the top-level checker.
//!
//! [`AvailabilityChecker`] is the seam between the dispatcher and whatever
//! answers "is this name taken?". [`NameChecker`] wires a provider, the
//! progress store and the dispatcher together for the common case.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::concurrent::{Dispatcher, RunObserver};
use crate::error::NameCheckError;
use crate::store::ProgressStore;
use crate::types::{CheckConfig, Outcome, RunReport, Source};

/// Something that can tell whether a name is free.
///
/// Implementations must never panic or return errors for per-name problems:
/// every failure becomes [`Outcome::ProviderError`] with a short message.
/// The token is handed through so an implementation can give up early;
/// one that ignores it simply finishes its lookup.
#[async_trait]
pub trait AvailabilityChecker: Send + Sync {
    /// Name recorded as the source of every result.
    fn source(&self) -> &str;

    /// Look up a single name.
    async fn check(&self, name: &str, cancel: &CancellationToken) -> Outcome;
}

/// Build the provider for `source` using the timeout from `config`.
pub fn checker_for(
    source: Source,
    config: &CheckConfig,
) -> Result<Arc<dyn AvailabilityChecker>, NameCheckError> {
    match source {
        #[cfg(feature = "osrs")]
        Source::Osrs => Ok(Arc::new(crate::protocols::HiscoreClient::with_timeout(
            source,
            config.timeout,
        )?)),
        #[cfg(feature = "rs3")]
        Source::Rs3 => Ok(Arc::new(crate::protocols::HiscoreClient::with_timeout(
            source,
            config.timeout,
        )?)),
        #[allow(unreachable_patterns)]
        other => Err(NameCheckError::config(format!(
            "Provider '{}' is not enabled in this build",
            other.key()
        ))),
    }
}

/// High-level entry point: one provider, one progress file.
///
/// # Example
///
/// ```rust,no_run
/// use name_check_lib::{CheckConfig, NameChecker, NoopObserver};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let checker = NameChecker::with_config(CheckConfig::default())?;
///     let report = checker
///         .run("Zezima, ab", CancellationToken::new(), &NoopObserver)
///         .await;
///     println!("{} available", report.summary.available);
///     Ok(())
/// }
/// ```
pub struct NameChecker {
    config: CheckConfig,
    store: Arc<ProgressStore>,
    dispatcher: Dispatcher,
}

impl NameChecker {
    /// Build a checker for `config.source`, loading `config.progress_file`.
    pub fn with_config(config: CheckConfig) -> Result<Self, NameCheckError> {
        let provider = checker_for(config.source, &config)?;
        Ok(Self::with_provider(config, provider))
    }

    /// Build a checker around a custom provider.
    pub fn with_provider(config: CheckConfig, provider: Arc<dyn AvailabilityChecker>) -> Self {
        let store = Arc::new(ProgressStore::open(config.progress_file.clone()));
        let dispatcher = Dispatcher::new(provider, Arc::clone(&store), config.clone());
        Self {
            config,
            store,
            dispatcher,
        }
    }

    /// Validate `raw` and check every accepted name.
    pub async fn run(
        &self,
        raw: &str,
        cancel: CancellationToken,
        observer: &dyn RunObserver,
    ) -> RunReport {
        self.dispatcher.run(raw, cancel, observer).await
    }

    /// Forget all progress, including the file on disk.
    pub fn clear_progress(&self) -> Result<(), NameCheckError> {
        self.store.clear()
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ProgressStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
