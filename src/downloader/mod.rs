//! Fetch orchestration and rate limiting
//!
//! This module provides the fetch engine: request-rate and concurrency
//! limits, the per-identifier retry state machine, the worker that applies
//! them, and the executor that fans identifiers out and drains outcomes.
//!
//! # Overview
//!
//! 1. **Configuration**: Describe the run with [`config::FetchConfig`]
//! 2. **Rate Limiting**: Every attempt passes [`rate_limit::RateLimiter`]
//! 3. **Concurrency**: Every fetch holds a [`gate::ConcurrencyGate`] permit
//! 4. **Retries**: [`retry::RetryPolicy`] drives the [`retry::RetryState`] machine
//! 5. **Execution**: [`executor::FetchExecutor`] dispatches [`worker::FetchWorker`]s
//!    and records each [`outcome::FetchOutcome`] in the result sink
//!
//! # Quick Start
//!
//! ```no_run
//! use order_fetcher::downloader::{run, FetchConfig};
//! use order_fetcher::OrderId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::new("http://127.0.0.1:8000", "./orders.csv").with_burst(8);
//! let ids = (1..=100).map(OrderId::new).collect();
//! let summary = run(config, ids).await?;
//! assert!(summary.is_complete());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Attempt-level errors never leave the worker; each identifier resolves to
//! exactly one [`FetchOutcome`]. Only run-level problems (invalid
//! configuration, HTTP client construction, output file errors) surface as
//! [`RunError`].

use std::sync::Arc;
use tracing::info;

pub mod config;
pub mod executor;
pub mod gate;
pub mod outcome;
pub mod progress;
pub mod rate_limit;
pub mod retry;
pub mod worker;

pub use config::{ConfigError, FetchConfig, OutputOrder};
pub use executor::{FetchExecutor, RunSummary};
pub use gate::{ConcurrencyGate, GateClosed, GatePermit};
pub use outcome::{Attempt, FailureReport, FetchOutcome};
pub use rate_limit::RateLimiter;
pub use retry::{AttemptClass, ErrorClass, FailureKind, RetryPolicy, RetryState};
pub use worker::FetchWorker;

use crate::events::{AttemptObserver, TracingObserver};
use crate::fetcher::{ReqwestTransport, Transport};
use crate::output::{OutputError, ResultSink};
use crate::shutdown::{ShutdownCoordinator, SharedShutdown};
use crate::OrderId;

/// Run-level errors
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Configuration rejected before any request
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Output file could not be created, written or synced
    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// Fetch `ids` with the production transport and tracing observer
///
/// # Errors
/// See [`RunError`].
pub async fn run(config: FetchConfig, ids: Vec<OrderId>) -> Result<RunSummary, RunError> {
    run_with_shutdown(config, ids, ShutdownCoordinator::shared()).await
}

/// [`run`] with a caller-owned shutdown signal
///
/// # Errors
/// See [`RunError`].
pub async fn run_with_shutdown(
    config: FetchConfig,
    ids: Vec<OrderId>,
    shutdown: SharedShutdown,
) -> Result<RunSummary, RunError> {
    config.validate()?;
    let transport = ReqwestTransport::new(config.connect_timeout, config.request_timeout)
        .map_err(|e| RunError::Client(e.to_string()))?;
    let observer = Arc::new(TracingObserver::new(config.max_attempts));
    run_with(config, ids, Arc::new(transport), observer, shutdown).await
}

/// Fetch `ids` through any [`Transport`] and [`AttemptObserver`]
///
/// # Errors
/// See [`RunError`].
pub async fn run_with(
    config: FetchConfig,
    ids: Vec<OrderId>,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn AttemptObserver>,
    shutdown: SharedShutdown,
) -> Result<RunSummary, RunError> {
    config.validate()?;

    let sink = Arc::new(ResultSink::create(
        &config.output_path,
        config.output_order,
        observer.clone(),
    )?);
    let policy = RetryPolicy::new(config.max_attempts, config.backoff)
        .with_max_retry_after(config.max_retry_after);
    let worker = FetchWorker::new(
        transport,
        config.base_url.clone(),
        RateLimiter::per_second(config.max_rps),
        ConcurrencyGate::new(config.burst),
        policy,
        observer,
        shutdown,
    );

    let summary = FetchExecutor::new(worker, sink.clone()).execute(ids).await?;
    info!(
        "Saved {} orders to {}",
        sink.stored().await,
        config.output_path.display()
    );
    Ok(summary)
}
