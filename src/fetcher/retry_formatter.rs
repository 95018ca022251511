//! Retry message formatting utilities.
//!
//! Builds the human-readable retry, recovery and failure messages that
//! accompany the structured fields of each observability event.

use std::time::Duration;

use crate::downloader::retry::{ErrorClass, FailureKind};
use crate::downloader::FailureReport;
use crate::OrderId;

/// Suggested remediation for an error class.
pub fn suggestion(class: ErrorClass) -> &'static str {
    match class {
        ErrorClass::NetworkTimeout => "Check network latency or raise --timeout-secs",
        ErrorClass::NetworkOffline => "Verify the service is running and --base-url is reachable",
        ErrorClass::NetworkGeneric => "Check network connectivity and try again",
        ErrorClass::RateLimited => "Lower --max-rps or --burst to stay under the service limit",
        ErrorClass::ServerError(_) => "The service may be unhealthy, try again later",
        ErrorClass::ClientError(404) => "Check that the identifier range exists on the service",
        ErrorClass::ClientError(_) | ErrorClass::UnexpectedStatus(_) => {
            "Review --base-url and the request path"
        }
        ErrorClass::MalformedResponse => "The service response does not match the order schema",
        ErrorClass::Cancelled => "Re-run the affected identifiers",
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts configured
    pub max_attempts: u32,
    /// Type of error that triggered retry
    pub class: ErrorClass,
    /// Backoff duration until next attempt
    pub backoff_duration: Duration,
    /// Identifier being fetched
    pub order_id: OrderId,
}

impl RetryContext {
    /// Convenience constructor used throughout the retry logic.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        class: ErrorClass,
        backoff_duration: Duration,
        order_id: OrderId,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            class,
            backoff_duration,
            order_id,
        }
    }

    /// Format standardized retry message with attempt counters and context.
    pub fn format_retry(&self) -> String {
        format!(
            "Order {}: attempt {}/{} failed with {} - retrying in {:.1} seconds",
            self.order_id,
            self.attempt,
            self.max_attempts,
            self.class,
            self.backoff_duration.as_secs_f64()
        )
    }

    /// Format recovery message when a later attempt succeeds.
    pub fn format_success(&self) -> String {
        format!(
            "Order {}: attempt {}/{} succeeded after {}",
            self.order_id, self.attempt, self.max_attempts, self.class
        )
    }
}

/// Format final failure summary with actionable suggestions.
pub fn format_failure(report: &FailureReport, max_attempts: u32) -> String {
    let mut lines = Vec::new();
    let headline = match report.kind {
        FailureKind::RetryExhausted => format!(
            "[FAILED] Order {} failed after {}/{} attempts",
            report.order_id, report.attempts, max_attempts
        ),
        FailureKind::Cancelled => format!(
            "[CANCELLED] Order {} abandoned after {} attempt(s)",
            report.order_id, report.attempts
        ),
        _ => format!(
            "[FAILED] Order {} failed on attempt {} ({})",
            report.order_id, report.attempts, report.kind
        ),
    };
    lines.push(headline);

    let last_error = report
        .last_error
        .map(|class| class.to_string())
        .unwrap_or_else(|| "none".to_string());
    lines.push(format!("  Last error: {last_error}"));
    lines.push(format!("  Detail: {}", report.detail));

    if let Some(class) = report.last_error {
        lines.push(format!("  Suggestion: {}", suggestion(class)));
    }
    if report.kind == FailureKind::RetryExhausted {
        lines.push(format!(
            "  Suggestion: Try increasing --max-attempts (current: {max_attempts})"
        ));
    }

    lines.join("\n")
}
