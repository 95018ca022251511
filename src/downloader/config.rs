//! Fetch configuration constants and the validated run configuration

use std::path::PathBuf;
use std::time::Duration;

/// Default service root.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default output file.
pub const DEFAULT_OUTPUT: &str = "orders.csv";

/// Default request ceiling per second.
/// 18 stays just under the service's 20 requests/second quota.
pub const DEFAULT_MAX_RPS: u32 = 18;

/// Default number of in-flight fetches.
pub const DEFAULT_BURST: usize = 50;

/// Upper bound on the burst size.
pub const MAX_BURST: usize = 512;

/// Default attempts per identifier, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Upper bound on attempts per identifier.
pub const MAX_ATTEMPTS: u32 = 20;

/// Default wait before retrying a 5xx, a transport error, or a 429 without a usable `Retry-After`.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Order in which rows are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputOrder {
    /// As fetches complete; each row is flushed immediately
    #[default]
    Completion,
    /// Buffered and written sorted by identifier when the sink closes
    Identifier,
}

/// Invalid configuration value
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Base URL is not an http(s) URL
    #[error("invalid base URL '{0}': expected http:// or https://")]
    InvalidBaseUrl(String),

    /// A numeric setting is out of range
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        /// Setting name
        name: &'static str,
        /// Lower bound
        min: u64,
        /// Upper bound
        max: u64,
        /// Supplied value
        value: u64,
    },

    /// A duration setting is zero or negative where that makes no sense
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Settings for one fetch run
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Service root, e.g. `http://127.0.0.1:8000`
    pub base_url: String,
    /// CSV output path
    pub output_path: PathBuf,
    /// Maximum in-flight fetches
    pub burst: usize,
    /// Maximum requests per second across all workers
    pub max_rps: u32,
    /// Attempts per identifier, including the first
    pub max_attempts: u32,
    /// Base backoff between retryable failures
    pub backoff: Duration,
    /// Optional cap on server-supplied `Retry-After` waits
    pub max_retry_after: Option<Duration>,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Row order in the output file
    pub output_order: OutputOrder,
}

impl FetchConfig {
    /// Configuration with every default except the base URL and output path
    pub fn new(base_url: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            output_path: output_path.into(),
            burst: DEFAULT_BURST,
            max_rps: DEFAULT_MAX_RPS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            max_retry_after: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            output_order: OutputOrder::Completion,
        }
    }

    /// Set the burst size
    pub fn with_burst(mut self, burst: usize) -> Self {
        self.burst = burst;
        self
    }

    /// Set the request ceiling per second
    pub fn with_max_rps(mut self, max_rps: u32) -> Self {
        self.max_rps = max_rps;
        self
    }

    /// Set attempts per identifier
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base backoff
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Cap `Retry-After` waits at `cap`
    pub fn with_max_retry_after(mut self, cap: Duration) -> Self {
        self.max_retry_after = Some(cap);
        self
    }

    /// Set the per-request and connect timeouts
    pub fn with_timeouts(mut self, request: Duration, connect: Duration) -> Self {
        self.request_timeout = request;
        self.connect_timeout = connect;
        self
    }

    /// Set the output row order
    pub fn with_output_order(mut self, order: OutputOrder) -> Self {
        self.output_order = order;
        self
    }

    /// Check every setting is usable
    ///
    /// # Errors
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url.trim();
        let has_host = base
            .strip_prefix("http://")
            .or_else(|| base.strip_prefix("https://"))
            .is_some_and(|rest| !rest.trim_matches('/').is_empty());
        if !has_host {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }

        check_range("burst", self.burst as u64, 1, MAX_BURST as u64)?;
        check_range("max_rps", u64::from(self.max_rps), 1, 10_000)?;
        check_range("max_attempts", u64::from(self.max_attempts), 1, u64::from(MAX_ATTEMPTS))?;

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("request_timeout"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("connect_timeout"));
        }
        Ok(())
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_OUTPUT)
    }
}

fn check_range(name: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            min,
            max,
            value,
        })
    }
}
