//! Per-run result collection.

use std::sync::{Mutex, MutexGuard};

use crate::types::{RunResult, RunStatus, RunSummary};

/// Append-only list of results for the current run.
///
/// Shared between the dispatcher (which appends) and reporting code (which
/// may read a snapshot while the run is still going).
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Mutex<Vec<RunResult>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, result: RunResult) {
        self.lock().push(result);
    }

    /// Copy of everything recorded so far, in completion order.
    pub fn snapshot(&self) -> Vec<RunResult> {
        self.lock().clone()
    }

    /// Counters over everything recorded so far.
    pub fn summary(&self) -> RunSummary {
        summarize(&self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all results; called when a new run starts.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RunResult>> {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Count checked, available and failed results.
pub fn summarize(results: &[RunResult]) -> RunSummary {
    let mut summary = RunSummary::default();

    for result in results {
        match result.status {
            RunStatus::Checked => {
                summary.checked += 1;
                if result.available == Some(true) {
                    summary.available += 1;
                }
            }
            RunStatus::Error => summary.errors += 1,
            RunStatus::Cancelled => {}
        }
        summary.total += 1;
    }

    summary
}
