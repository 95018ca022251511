//! Per-identifier fetch worker
//!
//! A [`FetchWorker`] resolves one identifier into exactly one
//! [`FetchOutcome`]. It holds a [`ConcurrencyGate`] permit for the whole
//! fetch, takes a [`RateLimiter`] slot before every attempt, and drives the
//! [`RetryState`] machine until it reaches `Success` or `Fatal`.
//!
//! Every suspension point (gate, rate limiter, HTTP call, retry wait) races
//! against the shared shutdown signal.

use std::sync::Arc;
use tokio::time::sleep;
use tracing::debug;

use super::gate::ConcurrencyGate;
use super::outcome::{Attempt, FailureReport, FetchOutcome};
use super::rate_limit::RateLimiter;
use super::retry::{AttemptClass, ErrorClass, FailureKind, RetryPolicy, RetryState};
use crate::events::{AttemptEvent, AttemptObserver};
use crate::fetcher::order_parser::OrderParser;
use crate::fetcher::{item_url, Transport};
use crate::metrics::{self, HttpRequestMetrics};
use crate::shutdown::SharedShutdown;
use crate::{OrderId, OrderRecord};

/// Result of one attempt, as seen by the retry loop
struct AttemptReport {
    attempt: Attempt,
    status: Option<u16>,
    detail: Option<String>,
    record: Option<OrderRecord>,
}

/// Fetches single identifiers using shared limiter, gate and transport
#[derive(Clone)]
pub struct FetchWorker {
    transport: Arc<dyn Transport>,
    base_url: String,
    rate_limiter: RateLimiter,
    gate: ConcurrencyGate,
    policy: RetryPolicy,
    observer: Arc<dyn AttemptObserver>,
    shutdown: SharedShutdown,
}

impl FetchWorker {
    /// Create a worker; every clone shares the same limiter, gate and shutdown signal
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        rate_limiter: RateLimiter,
        gate: ConcurrencyGate,
        policy: RetryPolicy,
        observer: Arc<dyn AttemptObserver>,
        shutdown: SharedShutdown,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            rate_limiter,
            gate,
            policy,
            observer,
            shutdown,
        }
    }

    /// Concurrency gate shared by this worker's clones
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Retry policy applied to every identifier
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Shutdown signal observed at every suspension point
    pub fn shutdown(&self) -> &SharedShutdown {
        &self.shutdown
    }

    /// Resolve one identifier
    pub async fn fetch(&self, id: OrderId) -> FetchOutcome {
        let _permit = match self.shutdown.run_until_shutdown(self.gate.acquire()).await {
            Some(Ok(permit)) => permit,
            Some(Err(closed)) => {
                return failure(id, FailureKind::Cancelled, None, 0, closed.to_string())
            }
            None => return cancelled(id, None, 0),
        };

        let mut state = self.policy.begin(RetryState::Pending);
        let mut record = None;
        let mut previous_error = None;
        let mut last_detail = None;

        loop {
            match state {
                RetryState::Pending => state = self.policy.begin(state),
                RetryState::Attempting { attempt } => {
                    let Some(report) = self.attempt(id, attempt).await else {
                        return cancelled(id, previous_error, attempt - 1);
                    };

                    self.observer.on_attempt(&AttemptEvent {
                        order_id: id,
                        attempt,
                        max_attempts: self.policy.max_attempts(),
                        class: report.attempt.class,
                        status: report.status,
                        detail: report.detail.clone(),
                        previous_error,
                    });

                    previous_error = report.attempt.class.error();
                    if report.detail.is_some() {
                        last_detail = report.detail;
                    }
                    if report.record.is_some() {
                        record = report.record;
                    }
                    state = self.policy.on_attempt(attempt, &report.attempt.class);
                }
                RetryState::Retrying {
                    attempt,
                    class,
                    wait,
                } => {
                    metrics::record_retry_backoff(wait, attempt);
                    if self.shutdown.run_until_shutdown(sleep(wait)).await.is_none() {
                        return cancelled(id, Some(class), attempt);
                    }
                    state = self.policy.begin(state);
                }
                RetryState::Success { attempts } => {
                    return match record {
                        Some(record) => FetchOutcome::Success { record, attempts },
                        None => failure(
                            id,
                            FailureKind::MalformedResponse,
                            Some(ErrorClass::MalformedResponse),
                            attempts,
                            "decoded order missing after successful attempt",
                        ),
                    };
                }
                RetryState::Fatal {
                    attempts,
                    kind,
                    class,
                } => {
                    let detail = last_detail.unwrap_or_else(|| class.to_string());
                    return failure(id, kind, Some(class), attempts, detail);
                }
            }
        }
    }

    /// Run attempt `number`; `None` if shutdown arrived before the request was sent
    async fn attempt(&self, id: OrderId, number: u32) -> Option<AttemptReport> {
        self.shutdown
            .run_until_shutdown(self.rate_limiter.acquire())
            .await?;

        let url = item_url(&self.base_url, id);
        let request_metrics = HttpRequestMetrics::start(number);
        debug!(
            order_id = id.get(),
            attempt = number,
            correlation_id = request_metrics.correlation_id(),
            url = %url,
            "Sending request"
        );

        let Some(result) = self.shutdown.run_until_shutdown(self.transport.get(&url)).await
        else {
            return Some(AttemptReport {
                attempt: Attempt {
                    number,
                    class: AttemptClass::Fatal {
                        class: ErrorClass::Cancelled,
                    },
                },
                status: None,
                detail: Some("shutdown requested during request".to_string()),
                record: None,
            });
        };

        let report = match result {
            Ok(response) => {
                let code = response.status.as_u16();
                request_metrics.record_complete(code);

                if response.status.is_success() {
                    match OrderParser::parse(&response.body, id) {
                        Ok(record) => AttemptReport {
                            attempt: Attempt {
                                number,
                                class: AttemptClass::Success,
                            },
                            status: Some(code),
                            detail: None,
                            record: Some(record),
                        },
                        Err(e) => AttemptReport {
                            attempt: Attempt {
                                number,
                                class: AttemptClass::Fatal {
                                    class: ErrorClass::MalformedResponse,
                                },
                            },
                            status: Some(code),
                            detail: Some(e.to_string()),
                            record: None,
                        },
                    }
                } else {
                    let retry_after = response.retry_after();
                    let class = self.policy.classify_status(response.status, retry_after);
                    let detail = match retry_after {
                        Some(value) => format!("HTTP {code} (Retry-After: {value})"),
                        None => format!("HTTP {code}"),
                    };
                    AttemptReport {
                        attempt: Attempt { number, class },
                        status: Some(code),
                        detail: Some(detail),
                        record: None,
                    }
                }
            }
            Err(err) => {
                request_metrics.record_network_error();
                AttemptReport {
                    attempt: Attempt {
                        number,
                        class: self.policy.classify_transport(&err),
                    },
                    status: None,
                    detail: Some(err.to_string()),
                    record: None,
                }
            }
        };

        Some(report)
    }
}

fn failure(
    id: OrderId,
    kind: FailureKind,
    last_error: Option<ErrorClass>,
    attempts: u32,
    detail: impl Into<String>,
) -> FetchOutcome {
    FetchOutcome::Failure(FailureReport::new(id, kind, last_error, attempts, detail))
}

fn cancelled(id: OrderId, last_error: Option<ErrorClass>, attempts: u32) -> FetchOutcome {
    failure(
        id,
        FailureKind::Cancelled,
        last_error,
        attempts,
        "shutdown requested",
    )
}
