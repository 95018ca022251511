//! Per-identifier retry state machine
//!
//! ```text
//! Pending -> Attempting -> Success
//!                       -> Retrying -> Attempting (attempt + 1)
//!                       -> Fatal
//! ```
//!
//! `Success` and `Fatal` are terminal. A retryable attempt that has already
//! used the last allowed attempt goes straight to `Fatal` with
//! [`FailureKind::RetryExhausted`].

use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;

use crate::fetcher::{TransportError, TransportErrorKind};

/// Classification of a single failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    ServerError(u16),
    /// Request or connect timeout
    NetworkTimeout,
    /// Connection refused, DNS failure
    NetworkOffline,
    /// Other transport failure
    NetworkGeneric,
    /// HTTP 4xx other than 429
    ClientError(u16),
    /// 1xx/3xx or anything else outside the handled ranges
    UnexpectedStatus(u16),
    /// 2xx whose body is not a valid order
    MalformedResponse,
    /// Shutdown requested while the attempt was in progress
    Cancelled,
}

impl ErrorClass {
    /// Whether another attempt may fix this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::ServerError(_)
                | Self::NetworkTimeout
                | Self::NetworkOffline
                | Self::NetworkGeneric
        )
    }

    /// Human-readable description used in log messages
    pub fn description(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::NetworkGeneric => "network error",
            Self::ClientError(code) => match code {
                400 => "invalid request",
                401 | 403 => "not authorized",
                404 => "order not found",
                _ => "client error",
            },
            Self::UnexpectedStatus(_) => "unexpected status",
            Self::MalformedResponse => "malformed response",
            Self::Cancelled => "cancelled",
        }
    }

    /// Stable machine label for structured logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::RateLimited => "retryable_rate_limited",
            Self::ServerError(_) => "retryable_server_error",
            Self::NetworkTimeout | Self::NetworkOffline | Self::NetworkGeneric => {
                "retryable_transport_error"
            }
            Self::ClientError(_) => "fatal_client_error",
            Self::UnexpectedStatus(_) => "fatal_unexpected_status",
            Self::MalformedResponse => "malformed_response",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerError(code) | Self::ClientError(code) | Self::UnexpectedStatus(code) => {
                write!(f, "{} ({code})", self.description())
            }
            _ => write!(f, "{}", self.description()),
        }
    }
}

/// Why an identifier ended in `Fatal`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Non-retryable status (4xx other than 429, or unexpected status)
    FatalClientError,
    /// Still retryable after the last allowed attempt
    RetryExhausted,
    /// 2xx with an undecodable or invalid body
    MalformedResponse,
    /// Shutdown requested before the identifier resolved
    Cancelled,
    /// The worker task panicked
    WorkerPanicked,
}

impl FailureKind {
    /// Stable machine label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FatalClientError => "fatal_client_error",
            Self::RetryExhausted => "retry_exhausted",
            Self::MalformedResponse => "malformed_response",
            Self::Cancelled => "cancelled",
            Self::WorkerPanicked => "worker_panicked",
        }
    }

    /// Failure kind for a non-retryable attempt class
    pub fn from_fatal(class: ErrorClass) -> Self {
        match class {
            ErrorClass::MalformedResponse => Self::MalformedResponse,
            ErrorClass::Cancelled => Self::Cancelled,
            ErrorClass::ClientError(_) | ErrorClass::UnexpectedStatus(_) => Self::FatalClientError,
            _ => Self::RetryExhausted,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one finished attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptClass {
    /// 2xx with a valid order body
    Success,
    /// Worth another attempt after `wait`
    Retryable {
        /// Error that triggered the retry
        class: ErrorClass,
        /// Delay before the next attempt
        wait: Duration,
    },
    /// No further attempts
    Fatal {
        /// Error that ended the fetch
        class: ErrorClass,
    },
}

impl AttemptClass {
    /// Error class, if the attempt failed
    pub fn error(&self) -> Option<ErrorClass> {
        match self {
            Self::Success => None,
            Self::Retryable { class, .. } | Self::Fatal { class } => Some(*class),
        }
    }
}

/// State of one identifier's fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Not started
    Pending,
    /// About to issue attempt number `attempt` (1-based)
    Attempting {
        /// Attempt number
        attempt: u32,
    },
    /// Attempt `attempt` failed retryably; wait before the next one
    Retrying {
        /// Attempt that just failed
        attempt: u32,
        /// Error that triggered the retry
        class: ErrorClass,
        /// Delay before the next attempt
        wait: Duration,
    },
    /// Order fetched
    Success {
        /// Attempts used
        attempts: u32,
    },
    /// Gave up
    Fatal {
        /// Attempts used
        attempts: u32,
        /// Failure kind
        kind: FailureKind,
        /// Last error observed
        class: ErrorClass,
    },
}

impl RetryState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Fatal { .. })
    }
}

/// Uniform retry policy shared by every worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
    max_retry_after: Option<Duration>,
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` attempts (at least 1) with
    /// `base_backoff` between retryable failures
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_retry_after: None,
        }
    }

    /// Cap server-supplied `Retry-After` waits; `None` honours them as sent
    pub fn with_max_retry_after(mut self, cap: Option<Duration>) -> Self {
        self.max_retry_after = cap;
        self
    }

    /// Maximum attempts per identifier, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Fixed backoff for 5xx, transport errors and unusable `Retry-After`
    pub fn base_backoff(&self) -> Duration {
        self.base_backoff
    }

    /// Enter (or re-enter) `Attempting`
    ///
    /// `Pending` starts attempt 1; `Retrying` moves to the next attempt.
    /// Any other state is returned unchanged.
    pub fn begin(&self, state: RetryState) -> RetryState {
        match state {
            RetryState::Pending => RetryState::Attempting { attempt: 1 },
            RetryState::Retrying { attempt, .. } => RetryState::Attempting {
                attempt: attempt.saturating_add(1),
            },
            other => other,
        }
    }

    /// Transition out of `Attempting` given how attempt `attempt` went
    pub fn on_attempt(&self, attempt: u32, outcome: &AttemptClass) -> RetryState {
        match *outcome {
            AttemptClass::Success => RetryState::Success { attempts: attempt },
            AttemptClass::Retryable { class, wait } if attempt < self.max_attempts => {
                RetryState::Retrying {
                    attempt,
                    class,
                    wait,
                }
            }
            AttemptClass::Retryable { class, .. } => RetryState::Fatal {
                attempts: attempt,
                kind: FailureKind::RetryExhausted,
                class,
            },
            AttemptClass::Fatal { class } => RetryState::Fatal {
                attempts: attempt,
                kind: FailureKind::from_fatal(class),
                class,
            },
        }
    }

    /// Classify a received status
    ///
    /// 2xx maps to `Success`; callers decode the body first and report a
    /// malformed body as `Fatal { MalformedResponse }` themselves.
    pub fn classify_status(&self, status: StatusCode, retry_after: Option<&str>) -> AttemptClass {
        let code = status.as_u16();
        if status.is_success() {
            AttemptClass::Success
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            AttemptClass::Retryable {
                class: ErrorClass::RateLimited,
                wait: self.retry_after_wait(retry_after),
            }
        } else if status.is_server_error() {
            AttemptClass::Retryable {
                class: ErrorClass::ServerError(code),
                wait: self.base_backoff,
            }
        } else if status.is_client_error() {
            AttemptClass::Fatal {
                class: ErrorClass::ClientError(code),
            }
        } else {
            AttemptClass::Fatal {
                class: ErrorClass::UnexpectedStatus(code),
            }
        }
    }

    /// Classify a transport failure; always retryable
    pub fn classify_transport(&self, err: &TransportError) -> AttemptClass {
        let class = match err.kind {
            TransportErrorKind::Timeout => ErrorClass::NetworkTimeout,
            TransportErrorKind::Connect => ErrorClass::NetworkOffline,
            TransportErrorKind::Other => ErrorClass::NetworkGeneric,
        };
        AttemptClass::Retryable {
            class,
            wait: self.base_backoff,
        }
    }

    /// Wait for a 429: the `Retry-After` value (capped when a cap is set),
    /// or the base backoff when the header is absent or unusable
    pub fn retry_after_wait(&self, header: Option<&str>) -> Duration {
        header
            .and_then(parse_retry_after)
            .map(|wait| match self.max_retry_after {
                Some(cap) => wait.min(cap),
                None => wait,
            })
            .unwrap_or(self.base_backoff)
    }
}

/// Parse a delta-seconds `Retry-After` value
///
/// Fractional values are accepted; negative values clamp to zero. Returns
/// `None` for non-numeric text (including HTTP-date values), NaN and infinity.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if !secs.is_finite() {
        return None;
    }
    Some(Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX))
}
