//! Observability stream
//!
//! Workers report every attempt and the sink reports every terminal failure
//! through an [`AttemptObserver`]. [`TracingObserver`] is the production
//! destination; [`RecordingObserver`] keeps
//! events in memory for inspection.

use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::downloader::retry::{AttemptClass, ErrorClass};
use crate::downloader::FailureReport;
use crate::fetcher::retry_formatter::{format_failure, RetryContext};
use crate::OrderId;

/// One finished attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptEvent {
    /// Identifier being fetched
    pub order_id: OrderId,
    /// Attempt number (1-based)
    pub attempt: u32,
    /// Configured maximum attempts
    pub max_attempts: u32,
    /// How the attempt went
    pub class: AttemptClass,
    /// HTTP status, if one was received
    pub status: Option<u16>,
    /// Error detail for failed attempts
    pub detail: Option<String>,
    /// Error of the previous attempt, if this one followed a retry
    pub previous_error: Option<ErrorClass>,
}

impl AttemptEvent {
    /// Wait scheduled after this attempt, if it will be retried
    pub fn retry_wait(&self) -> Option<Duration> {
        match self.class {
            AttemptClass::Retryable { wait, .. } => Some(wait),
            _ => None,
        }
    }
}

/// Destination for the observability stream
pub trait AttemptObserver: Send + Sync {
    /// Called once per attempt, before the worker moves on
    fn on_attempt(&self, event: &AttemptEvent);

    /// Called once per identifier that resolved as a failure
    fn on_failure(&self, report: &FailureReport);
}

/// Emits `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver {
    max_attempts: u32,
}

impl TracingObserver {
    /// Create an observer; `max_attempts` is used in failure summaries
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl AttemptObserver for TracingObserver {
    fn on_attempt(&self, event: &AttemptEvent) {
        match event.class {
            AttemptClass::Success => {
                if let Some(previous) = event.previous_error {
                    let ctx = RetryContext::new(
                        event.attempt,
                        event.max_attempts,
                        previous,
                        Duration::ZERO,
                        event.order_id,
                    );
                    info!(
                        order_id = event.order_id.get(),
                        attempt = event.attempt,
                        "{}",
                        ctx.format_success()
                    );
                } else {
                    debug!(
                        order_id = event.order_id.get(),
                        attempt = event.attempt,
                        status = event.status,
                        "Order fetched"
                    );
                }
            }
            AttemptClass::Retryable { class, wait } => {
                let ctx = RetryContext::new(
                    event.attempt,
                    event.max_attempts,
                    class,
                    wait,
                    event.order_id,
                );
                warn!(
                    order_id = event.order_id.get(),
                    attempt = event.attempt,
                    classification = class.label(),
                    status = event.status,
                    wait_ms = wait.as_millis() as u64,
                    detail = event.detail.as_deref().unwrap_or(""),
                    "{}",
                    ctx.format_retry()
                );
            }
            AttemptClass::Fatal { class } => {
                warn!(
                    order_id = event.order_id.get(),
                    attempt = event.attempt,
                    classification = class.label(),
                    status = event.status,
                    detail = event.detail.as_deref().unwrap_or(""),
                    "Order {} attempt {}/{} failed with {}, not retrying",
                    event.order_id,
                    event.attempt,
                    event.max_attempts,
                    class
                );
            }
        }
    }

    fn on_failure(&self, report: &FailureReport) {
        error!(
            order_id = report.order_id.get(),
            kind = report.kind.as_str(),
            attempts = report.attempts,
            last_error = report.last_error.map(|c| c.label()).unwrap_or("none"),
            "{}",
            format_failure(report, self.max_attempts)
        );
    }
}

/// Entry captured by [`RecordingObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    /// An attempt finished
    Attempt(AttemptEvent),
    /// An identifier failed
    Failure(FailureReport),
}

/// Keeps every event in memory, in arrival order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.lock().clone()
    }

    /// Attempt events for one identifier
    pub fn attempts_for(&self, order_id: OrderId) -> Vec<AttemptEvent> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                ObservedEvent::Attempt(attempt) if attempt.order_id == order_id => {
                    Some(attempt.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Retry entries (retryable attempts) for one identifier
    pub fn retries_for(&self, order_id: OrderId) -> Vec<AttemptEvent> {
        self.attempts_for(order_id)
            .into_iter()
            .filter(|event| matches!(event.class, AttemptClass::Retryable { .. }))
            .collect()
    }

    /// All failure reports
    pub fn failures(&self) -> Vec<FailureReport> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                ObservedEvent::Failure(report) => Some(report.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ObservedEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AttemptObserver for RecordingObserver {
    fn on_attempt(&self, event: &AttemptEvent) {
        self.lock().push(ObservedEvent::Attempt(event.clone()));
    }

    fn on_failure(&self, report: &FailureReport) {
        self.lock().push(ObservedEvent::Failure(report.clone()));
    }
}
