//! Concurrent dispatch of name lookups.
//!
//! The [`Dispatcher`] runs one [`AvailabilityChecker`] call per name on a
//! bounded pool of tokio tasks, records completions as they arrive, keeps
//! the progress store current and reacts to a cancellation token.
//!
//! Cancellation is cooperative. A task checks the token after it gets a
//! worker slot and again after its rate-limit pause; the token is also
//! handed to the provider. When the coordinating loop sees the token it
//! stops consuming completions, aborts the remaining tasks without waiting
//! for them, writes a final snapshot and returns [`RunEnd::Stopped`].

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::ResultAggregator;
use crate::checker::AvailabilityChecker;
use crate::store::ProgressStore;
use crate::types::{
    CheckConfig, Outcome, RunEnd, RunReport, RunResult, MAX_WORKERS, MIN_WORKERS,
};
use crate::validate::validate_names;

/// Receives progress from a running dispatcher.
///
/// All methods are called from the coordinating loop, one at a time, and
/// have no-op defaults.
pub trait RunObserver: Send + Sync {
    /// `completed` of `total` submitted names have finished.
    fn on_progress(&self, _completed: usize, _total: usize) {}

    /// Human readable run event (skips, rejections, start, stop).
    fn on_log(&self, _message: &str) {}

    /// A name finished; its store record is already updated.
    fn on_result(&self, _result: &RunResult) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// What a single task produced.
#[derive(Debug)]
enum TaskOutcome {
    Completed(Outcome),
    /// The token was set before the provider was contacted
    Cancelled,
}

/// Bounded concurrent executor for name lookups.
pub struct Dispatcher {
    checker: Arc<dyn AvailabilityChecker>,
    store: Arc<ProgressStore>,
    aggregator: Arc<ResultAggregator>,
    config: CheckConfig,
}

impl Dispatcher {
    pub fn new(
        checker: Arc<dyn AvailabilityChecker>,
        store: Arc<ProgressStore>,
        config: CheckConfig,
    ) -> Self {
        Self {
            checker,
            store,
            aggregator: Arc::new(ResultAggregator::new()),
            config,
        }
    }

    /// Results of the current (or last) run; readable while a run is going.
    pub fn aggregator(&self) -> Arc<ResultAggregator> {
        Arc::clone(&self.aggregator)
    }

    pub fn store(&self) -> &Arc<ProgressStore> {
        &self.store
    }

    /// Split `names` into those to submit and those already resolved.
    ///
    /// Names with a `Checked` record are skipped; names with an `Error`
    /// record or no record are submitted.
    pub fn plan(&self, names: &[String]) -> (Vec<String>, Vec<String>) {
        names.iter().cloned().partition(|name| {
            !self
                .store
                .get(name)
                .map(|record| record.is_resolved())
                .unwrap_or(false)
        })
    }

    /// Validate comma-separated input, then check every accepted name.
    pub async fn run(
        &self,
        raw: &str,
        cancel: CancellationToken,
        observer: &dyn RunObserver,
    ) -> RunReport {
        let validation = validate_names(raw);

        for rejection in &validation.rejected {
            info!(token = %rejection.token, reason = ?rejection.reason, "rejected name");
            observer.on_log(&format!(
                "[validation] {} {}",
                rejection.token, rejection.reason
            ));
        }

        let mut report = self.run_names(validation.accepted, cancel, observer).await;
        report.rejected = validation.rejected;
        report
    }

    /// Check an already validated list of names.
    ///
    /// Always returns a report; per-name failures are recorded as results.
    pub async fn run_names(
        &self,
        names: Vec<String>,
        cancel: CancellationToken,
        observer: &dyn RunObserver,
    ) -> RunReport {
        self.aggregator.reset();

        let (pending, skipped) = self.plan(&names);
        for name in &skipped {
            info!(name = %name, "already checked, skipping");
            observer.on_log(&format!("[skipped] {} - already checked", name));
        }

        if pending.is_empty() {
            observer.on_log("No names left to check");
            return self.report(RunEnd::Completed, skipped);
        }

        let total = pending.len();
        let workers = self
            .config
            .workers
            .clamp(MIN_WORKERS, MAX_WORKERS)
            .min(total);
        let source = self.checker.source().to_string();

        info!(total, workers, source = %source, "starting run");
        observer.on_log(&format!(
            "Starting check for {} names with {} workers on {}",
            total, workers, source
        ));

        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        for name in pending {
            let checker = Arc::clone(&self.checker);
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();
            let delay = self.config.rate_limit_delay;
            tasks.spawn(async move {
                // Covers the whole task, including a provider that panics
                // before its lookup future exists, so the name is never lost.
                let outcome = AssertUnwindSafe(run_task(checker, &name, permits, delay, &cancel))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        warn!(name = %name, error = %message, "worker task panicked");
                        TaskOutcome::Completed(Outcome::error(format!(
                            "task panicked: {}",
                            message
                        )))
                    });
                (name, outcome)
            });
        }

        let snapshot_every = self.config.snapshot_interval.max(1);
        let mut completed = 0usize;
        let mut end = RunEnd::Completed;

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    end = RunEnd::Stopped;
                    break;
                }
                joined = tasks.join_next() => joined,
            };

            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((name, TaskOutcome::Completed(outcome))) => {
                    let result = RunResult::from_outcome(&name, &source, outcome);
                    if let Some(record) = result.to_record() {
                        self.store.upsert(record);
                    }
                    self.aggregator.push(result.clone());
                    completed += 1;

                    debug!(name = %name, status = ?result.status, completed, total, "name finished");
                    observer.on_result(&result);
                    observer.on_progress(completed, total);

                    if completed % snapshot_every == 0 && completed < total {
                        self.save_progress(observer).await;
                    }
                }
                Ok((name, TaskOutcome::Cancelled)) => {
                    debug!(name = %name, "cancelled before lookup");
                }
                Err(e) => {
                    warn!(error = %e, "worker task ended abnormally");
                }
            }
        }

        if end == RunEnd::Stopped {
            // Not-yet-started tasks never run; in-flight ones are dropped at
            // their next await point. Nothing here waits for them.
            tasks.abort_all();
            info!(completed, total, "run stopped");
            observer.on_log(&format!("Stopped after {}/{} names", completed, total));
        } else {
            info!(completed, total, "run complete");
            observer.on_log(&format!("Completed - {} names checked", completed));
        }

        self.save_progress(observer).await;
        self.report(end, skipped)
    }

    /// Write the store to disk off the async threads. Failures are logged.
    async fn save_progress(&self, observer: &dyn RunObserver) {
        let store = Arc::clone(&self.store);
        let saved = tokio::task::spawn_blocking(move || store.snapshot()).await;

        let failure = match saved {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("snapshot task failed: {}", e),
        };
        warn!(error = %failure, "failed to save progress");
        observer.on_log(&format!("[error] Failed to save progress: {}", failure));
    }

    fn report(&self, end: RunEnd, skipped: Vec<String>) -> RunReport {
        RunReport {
            end,
            summary: self.aggregator.summary(),
            results: self.aggregator.snapshot(),
            rejected: Vec::new(),
            skipped,
        }
    }
}

/// Body of one worker task.
async fn run_task(
    checker: Arc<dyn AvailabilityChecker>,
    name: &str,
    permits: Arc<Semaphore>,
    delay: Duration,
    cancel: &CancellationToken,
) -> TaskOutcome {
    // Held until the task returns, so at most `workers` tasks run at once.
    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return TaskOutcome::Cancelled,
    };

    if cancel.is_cancelled() {
        return TaskOutcome::Cancelled;
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return TaskOutcome::Cancelled,
        _ = tokio::time::sleep(delay) => {}
    }

    if cancel.is_cancelled() {
        return TaskOutcome::Cancelled;
    }

    TaskOutcome::Completed(checker.check(name, cancel).await)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NameRecord, NameStatus, RunStatus};
    use async_trait::async_trait;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers `Available` for every name and tracks peak concurrency.
    #[derive(Default)]
    struct CountingChecker {
        calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl AvailabilityChecker for CountingChecker {
        fn source(&self) -> &str {
            "Test Hiscores"
        }

        async fn check(&self, _name: &str, _cancel: &CancellationToken) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Outcome::Available
        }
    }

    /// Panics for `boom` while building the lookup future, before any await.
    struct EagerPanicChecker;

    impl AvailabilityChecker for EagerPanicChecker {
        fn source(&self) -> &str {
            "Test Hiscores"
        }

        fn check<'life0, 'life1, 'life2, 'async_trait>(
            &'life0 self,
            name: &'life1 str,
            _cancel: &'life2 CancellationToken,
        ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'async_trait>>
        where
            'life0: 'async_trait,
            'life1: 'async_trait,
            'life2: 'async_trait,
            Self: 'async_trait,
        {
            if name == "boom" {
                panic!("lookup setup failed");
            }
            Box::pin(async { Outcome::Taken })
        }
    }

    fn dispatcher(checker: Arc<dyn AvailabilityChecker>, workers: usize) -> Dispatcher {
        let config = CheckConfig::default()
            .with_workers(workers)
            .with_rate_limit_delay(Duration::from_millis(1));
        Dispatcher::new(checker, Arc::new(ProgressStore::new("unused.json")), config)
    }

    #[test]
    fn test_plan_skips_checked_and_retries_errors() {
        let dispatcher = dispatcher(Arc::new(CountingChecker::default()), 5);
        dispatcher
            .store()
            .upsert(NameRecord::checked("done", "Test Hiscores", true));
        dispatcher
            .store()
            .upsert(NameRecord::error("failed", "Test Hiscores", "timeout"));

        let names = vec!["done".to_string(), "failed".to_string(), "new".to_string()];
        let (submit, skipped) = dispatcher.plan(&names);
        assert_eq!(submit, vec!["failed", "new"]);
        assert_eq!(skipped, vec!["done"]);
    }

    #[tokio::test]
    async fn test_worker_bound_is_respected() {
        let dir = tempfile::TempDir::new().unwrap();
        let checker = Arc::new(CountingChecker::default());
        let config = CheckConfig::default()
            .with_workers(3)
            .with_rate_limit_delay(Duration::from_millis(1))
            .with_progress_file(dir.path().join("progress.json"));
        let store = Arc::new(ProgressStore::new(config.progress_file.clone()));
        let dispatcher = Dispatcher::new(checker.clone(), store, config);

        let names: Vec<String> = (0..12).map(|i| format!("name{}", i)).collect();
        let report = dispatcher
            .run_names(names, CancellationToken::new(), &NoopObserver)
            .await;

        assert_eq!(report.end, RunEnd::Completed);
        assert_eq!(report.results.len(), 12);
        assert_eq!(checker.calls.load(Ordering::SeqCst), 12);
        assert!(checker.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_contacts_nobody() {
        let dir = tempfile::TempDir::new().unwrap();
        let checker = Arc::new(CountingChecker::default());
        let config = CheckConfig::default().with_progress_file(dir.path().join("progress.json"));
        let store = Arc::new(ProgressStore::new(config.progress_file.clone()));
        let dispatcher = Dispatcher::new(checker.clone(), store, config);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = dispatcher
            .run_names(vec!["ab".into(), "cd".into()], cancel, &NoopObserver)
            .await;

        assert_eq!(report.end, RunEnd::Stopped);
        assert!(report.results.is_empty());
        assert_eq!(checker.calls.load(Ordering::SeqCst), 0);
        assert!(dispatcher.store().is_empty());
    }

    #[tokio::test]
    async fn test_run_task_checkpoint_after_delay() {
        let checker: Arc<dyn AvailabilityChecker> = Arc::new(CountingChecker::default());
        let cancel = CancellationToken::new();
        let permits = Arc::new(Semaphore::new(1));

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let outcome = run_task(
            checker,
            "ab",
            permits,
            Duration::from_millis(500),
            &cancel,
        )
        .await;
        assert!(matches!(outcome, TaskOutcome::Cancelled));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_eager_provider_panic_becomes_error_result() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = CheckConfig::default()
            .with_workers(2)
            .with_rate_limit_delay(Duration::from_millis(1))
            .with_progress_file(dir.path().join("progress.json"));
        let store = Arc::new(ProgressStore::new(config.progress_file.clone()));
        let dispatcher = Dispatcher::new(Arc::new(EagerPanicChecker), store, config);

        let report = dispatcher
            .run_names(
                vec!["ab".into(), "boom".into(), "cd".into()],
                CancellationToken::new(),
                &NoopObserver,
            )
            .await;

        assert_eq!(report.end, RunEnd::Completed);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.summary.errors, 1);

        let boom = report.results.iter().find(|r| r.name == "boom").unwrap();
        assert_eq!(boom.status, RunStatus::Error);
        assert_eq!(
            boom.error.as_deref(),
            Some("task panicked: lookup setup failed")
        );

        let record = dispatcher.store().get("boom").unwrap();
        assert_eq!(record.status, NameStatus::Error);
        assert!(record.available.is_none());
    }

    #[tokio::test]
    async fn test_results_carry_provider_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = CheckConfig::default()
            .with_rate_limit_delay(Duration::from_millis(1))
            .with_progress_file(dir.path().join("progress.json"));
        let store = Arc::new(ProgressStore::new(config.progress_file.clone()));
        let dispatcher = Dispatcher::new(Arc::new(CountingChecker::default()), store, config);

        let report = dispatcher
            .run_names(vec!["ab".into()], CancellationToken::new(), &NoopObserver)
            .await;
        assert_eq!(report.results[0].source, "Test Hiscores");
        assert_eq!(report.results[0].status, RunStatus::Checked);
        assert_eq!(
            dispatcher.store().get("ab").unwrap().source,
            "Test Hiscores"
        );
    }
}
