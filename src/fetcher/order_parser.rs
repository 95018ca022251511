//! Order response parser
//!
//! Stateless decoding of a 2xx response body into an [`OrderRecord`]. Fields
//! outside the order schema (contact details, line items, source tags) are
//! ignored. A body that decodes but fails validation is rejected the same way
//! as one that does not decode at all.

use crate::{OrderId, OrderRecord};

/// Body could not be turned into a valid [`OrderRecord`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Body is not JSON or does not match the order schema
    #[error("failed to decode order body: {0}")]
    Decode(String),

    /// Body decoded but belongs to a different identifier
    #[error("response is for order {actual}, expected {expected}")]
    IdMismatch {
        /// Requested identifier
        expected: u64,
        /// Identifier found in the body
        actual: u64,
    },

    /// Body decoded but violates an order invariant
    #[error("invalid order: {0}")]
    Invalid(String),
}

/// Stateless parser for order responses
pub struct OrderParser;

impl OrderParser {
    /// Decode and validate an order body for `expected`
    ///
    /// # Errors
    /// Returns [`ParseError`] if the body is not a valid order for `expected`.
    pub fn parse(body: &[u8], expected: OrderId) -> Result<OrderRecord, ParseError> {
        let record: OrderRecord =
            serde_json::from_slice(body).map_err(|e| ParseError::Decode(e.to_string()))?;

        if record.order_id != expected.get() {
            return Err(ParseError::IdMismatch {
                expected: expected.get(),
                actual: record.order_id,
            });
        }

        record.validate().map_err(ParseError::Invalid)?;
        Ok(record)
    }
}
