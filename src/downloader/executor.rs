//! Fetch executor: dispatches workers and drains their outcomes
//!
//! Each identifier runs as its own spawned task. Dispatch is bounded by the
//! burst size; outcomes are drained as they complete and handed to the
//! [`ResultSink`]. A task that panics still resolves its identifier as
//! [`FailureKind::WorkerPanicked`].

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::outcome::{FailureReport, FetchOutcome};
use super::progress::{ProgressState, ProgressTracker};
use super::retry::FailureKind;
use super::worker::FetchWorker;
use crate::output::{OutputResult, ResultSink};
use crate::OrderId;

/// Aggregate result of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Identifiers submitted
    pub total: usize,
    /// Identifiers resolved with a stored order
    pub succeeded: usize,
    /// Identifiers resolved with a failure other than cancellation
    pub failed: usize,
    /// Identifiers abandoned because of shutdown
    pub cancelled: usize,
    /// HTTP attempts made across all identifiers
    pub attempts: u64,
    /// Failure counts keyed by failure kind label
    pub failures_by_kind: BTreeMap<&'static str, usize>,
    /// Wall-clock duration in seconds
    pub elapsed_secs: f64,
}

impl RunSummary {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Count one terminal outcome
    pub fn record(&mut self, outcome: &FetchOutcome) {
        self.attempts += u64::from(outcome.attempts());
        match outcome.failure_kind() {
            None => self.succeeded += 1,
            Some(kind) => {
                if kind == FailureKind::Cancelled {
                    self.cancelled += 1;
                } else {
                    self.failed += 1;
                }
                *self.failures_by_kind.entry(kind.as_str()).or_insert(0) += 1;
            }
        }
    }

    /// Identifiers resolved so far
    pub fn resolved(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }

    /// Whether every submitted identifier has an outcome
    pub fn is_complete(&self) -> bool {
        self.resolved() == self.total
    }

    /// Wall-clock duration
    pub fn elapsed(&self) -> Duration {
        Duration::try_from_secs_f64(self.elapsed_secs).unwrap_or_default()
    }
}

/// Runs a set of identifiers through a [`FetchWorker`] into a [`ResultSink`]
pub struct FetchExecutor {
    worker: FetchWorker,
    sink: Arc<ResultSink>,
    burst: usize,
    progress_tracker: ProgressTracker,
}

impl FetchExecutor {
    /// Create an executor dispatching at most the worker gate's burst at once
    pub fn new(worker: FetchWorker, sink: Arc<ResultSink>) -> Self {
        let burst = worker.gate().burst();
        Self {
            worker,
            sink,
            burst,
            progress_tracker: ProgressTracker::default(),
        }
    }

    /// Fetch every identifier, record every outcome, then close the sink
    ///
    /// Repeated identifiers are fetched once.
    ///
    /// # Errors
    /// Returns an error only if the sink fails; per-identifier failures are
    /// counted in the summary. A sink error raises the shared shutdown signal
    /// before it is returned, so workers already spawned stop sending requests.
    pub async fn execute(&self, ids: Vec<OrderId>) -> OutputResult<RunSummary> {
        let started = Instant::now();
        let ids = unique_in_order(ids);
        let mut summary = RunSummary::new(ids.len());
        let mut progress = self.progress_tracker.create_state(ids.len() as u64);

        info!(
            total = ids.len(),
            burst = self.burst,
            max_attempts = self.worker.policy().max_attempts(),
            "Starting fetch run"
        );

        let mut outcomes = stream::iter(ids)
            .map(|id| {
                let worker = self.worker.clone();
                let handle = tokio::spawn(async move { worker.fetch(id).await });
                async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(join_error) => {
                            error!(order_id = id.get(), error = %join_error, "Worker task failed");
                            FetchOutcome::Failure(FailureReport::new(
                                id,
                                FailureKind::WorkerPanicked,
                                None,
                                0,
                                join_error.to_string(),
                            ))
                        }
                    }
                }
            })
            .buffer_unordered(self.burst);

        while let Some(outcome) = outcomes.next().await {
            if let Err(e) = self.sink.record(&outcome).await {
                error!(error = %e, "Result sink failed; cancelling outstanding fetches");
                self.worker.shutdown().request_shutdown();
                return Err(e);
            }
            summary.record(&outcome);
            report_progress(&mut progress, outcome.is_success());
        }

        self.sink.close().await?;
        summary.elapsed_secs = started.elapsed().as_secs_f64();

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            attempts = summary.attempts,
            elapsed_secs = summary.elapsed_secs,
            "Fetch run finished"
        );
        Ok(summary)
    }
}

fn unique_in_order(ids: Vec<OrderId>) -> Vec<OrderId> {
    let submitted = ids.len();
    let mut seen = HashSet::with_capacity(submitted);
    let unique: Vec<OrderId> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
    if unique.len() < submitted {
        warn!(
            skipped = submitted - unique.len(),
            "Repeated identifiers will be fetched once"
        );
    }
    unique
}

fn report_progress(progress: &mut ProgressState, success: bool) {
    progress.update(success);
    if progress.should_emit_update() {
        info!("{}", progress.format_progress());
        progress.mark_emitted();
    }
}
