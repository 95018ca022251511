//! Attempt and outcome structures
//!
//! An [`Attempt`] lives only inside one worker invocation. A [`FetchOutcome`]
//! is the single terminal result per identifier and the only thing that crosses
//! from the worker to the sink and the executor.

use serde::Serialize;

use super::retry::{AttemptClass, ErrorClass, FailureKind};
use crate::{OrderId, OrderRecord};

/// One HTTP call for a given identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// Attempt number (1-based)
    pub number: u32,
    /// How the attempt went, including the wait before the next one
    pub class: AttemptClass,
}

/// Diagnostic record for an identifier that did not produce an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    /// Identifier that failed
    #[serde(serialize_with = "serialize_id")]
    pub order_id: OrderId,
    /// Why it failed
    #[serde(serialize_with = "serialize_kind")]
    pub kind: FailureKind,
    /// Last attempt-level error, if any attempt was made
    #[serde(serialize_with = "serialize_class")]
    pub last_error: Option<ErrorClass>,
    /// Attempts made
    pub attempts: u32,
    /// Final error detail
    pub detail: String,
}

impl FailureReport {
    /// Create a failure report
    pub fn new(
        order_id: OrderId,
        kind: FailureKind,
        last_error: Option<ErrorClass>,
        attempts: u32,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            kind,
            last_error,
            attempts,
            detail: detail.into(),
        }
    }
}

/// Terminal result for one identifier
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Order fetched and validated
    Success {
        /// Decoded order
        record: OrderRecord,
        /// Attempts used
        attempts: u32,
    },
    /// Gave up on this identifier
    Failure(FailureReport),
}

impl FetchOutcome {
    /// Identifier this outcome resolves
    pub fn order_id(&self) -> OrderId {
        match self {
            Self::Success { record, .. } => OrderId::new(record.order_id),
            Self::Failure(report) => report.order_id,
        }
    }

    /// Attempts used
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } => *attempts,
            Self::Failure(report) => report.attempts,
        }
    }

    /// Whether the order was fetched
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure kind, if failed
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(report) => Some(report.kind),
        }
    }
}

fn serialize_id<S: serde::Serializer>(id: &OrderId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(id.get())
}

fn serialize_kind<S: serde::Serializer>(kind: &FailureKind, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.as_str())
}

fn serialize_class<S: serde::Serializer>(
    class: &Option<ErrorClass>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match class {
        Some(class) => s.serialize_str(&class.to_string()),
        None => s.serialize_none(),
    }
}
