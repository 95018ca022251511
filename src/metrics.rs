//! Production observability metrics for the order fetcher
//!
//! Counters and histograms for attempts, 429s, retries, rate-limiter waits and
//! per-identifier outcomes.
//!
//! ## Architecture
//!
//! - Uses the `metrics` crate facade; without an installed recorder every
//!   macro is a no-op
//! - [`init_metrics`] installs a Prometheus exporter with a scrape endpoint
//!   (e.g. `0.0.0.0:9090/metrics`)

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::downloader::FailureKind;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Metrics exporter could not be installed
#[derive(Debug, thiserror::Error)]
#[error("failed to install Prometheus exporter: {0}")]
pub struct MetricsError(String);

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: a second call is a no-op.
///
/// # Arguments
/// * `addr` - Socket address for the Prometheus scrape endpoint
///
/// # Errors
/// Returns an error if the listener cannot be installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        METRICS_INITIALIZED.store(false, Ordering::SeqCst);
        return Err(MetricsError(e.to_string()));
    }

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP attempts made to the order service"
    );
    describe_counter!(
        "http_429_errors_total",
        Unit::Count,
        "Total number of 429 rate limit responses received"
    );
    describe_counter!("http_retries_total", Unit::Count, "Total number of retries scheduled");
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP attempt duration in seconds"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );
    describe_histogram!(
        "rate_limit_queue_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for a rate limit slot"
    );
    describe_gauge!(
        "rate_limit_permits_available",
        Unit::Count,
        "Currently available rate limit slots"
    );
    describe_counter!(
        "orders_fetched_total",
        Unit::Count,
        "Identifiers resolved with a stored order"
    );
    describe_counter!(
        "orders_failed_total",
        Unit::Count,
        "Identifiers resolved with a failure"
    );

    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Whether [`init_metrics`] has succeeded
pub fn is_initialized() -> bool {
    METRICS_INITIALIZED.load(Ordering::SeqCst)
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and counters for one HTTP attempt
pub struct HttpRequestMetrics {
    start_time: Instant,
    correlation_id: String,
    attempt: u32,
}

impl HttpRequestMetrics {
    /// Start recording an attempt
    pub fn start(attempt: u32) -> Self {
        Self {
            start_time: Instant::now(),
            correlation_id: generate_correlation_id(),
            attempt,
        }
    }

    /// Record an attempt that received a status
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "status" => status_code.to_string(),
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);
        histogram!("http_request_duration_seconds").record(duration.as_secs_f64());

        if status_code == 429 {
            counter!("http_429_errors_total").increment(1);
        }

        debug!(
            correlation_id = %self.correlation_id,
            status = status_code,
            attempt = self.attempt,
            duration_ms = duration.as_millis() as u64,
            "HTTP request completed"
        );
    }

    /// Record an attempt that failed below HTTP
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "status" => "network_error",
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);
        histogram!("http_request_duration_seconds").record(duration.as_secs_f64());

        debug!(
            correlation_id = %self.correlation_id,
            attempt = self.attempt,
            duration_ms = duration.as_millis() as u64,
            "HTTP request failed below HTTP layer"
        );
    }

    /// Correlation ID for this attempt
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record a scheduled retry and its backoff
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!("http_retries_total", "attempt" => attempt.to_string()).increment(1);
    histogram!("retry_backoff_duration_seconds").record(duration.as_secs_f64());
}

/// Record the terminal outcome of one identifier
pub fn record_outcome(failure: Option<FailureKind>) {
    match failure {
        None => counter!("orders_fetched_total").increment(1),
        Some(kind) => counter!("orders_failed_total", "kind" => kind.as_str()).increment(1),
    }
}

/// Rate limiter wait-time metrics
#[derive(Debug, Default)]
pub struct RateLimiterMetrics {
    start_time: Option<Instant>,
}

impl RateLimiterMetrics {
    /// Create a new rate limiter metrics instance
    pub fn new() -> Self {
        Self { start_time: None }
    }

    /// Start measuring queue wait time
    pub fn start_acquire(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Record a granted slot
    pub fn record_acquired(&mut self) {
        if let Some(start) = self.start_time.take() {
            let wait = start.elapsed();
            histogram!("rate_limit_queue_wait_seconds").record(wait.as_secs_f64());

            if wait > Duration::from_secs(5) {
                warn!(
                    wait_ms = wait.as_millis() as u64,
                    "Rate limit slot acquired after long wait"
                );
            } else if wait.as_millis() > 100 {
                debug!(wait_ms = wait.as_millis() as u64, "Rate limit slot acquired after wait");
            }
        }
    }

    /// Update available slots gauge
    pub fn update_available_permits(&self, available: usize) {
        gauge!("rate_limit_permits_available").set(available as f64);
    }
}
