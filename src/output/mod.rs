//! Output writers and the concurrent result sink

use crate::OrderRecord;

pub mod csv;
pub mod sink;

pub use self::csv::{CsvOrdersWriter, CSV_HEADER};
pub use sink::ResultSink;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),

    /// Write attempted after close
    #[error("output already closed")]
    Closed,
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Generic output writer trait
pub trait OutputWriter {
    /// Flush any buffered data to the OS
    fn flush(&mut self) -> OutputResult<()>;

    /// Flush, fsync and finalize output
    fn close(self) -> OutputResult<()>;
}

/// Trait for writing orders
pub trait OrdersWriter: OutputWriter {
    /// Write a single order; returns `false` if its identifier was already written
    fn write_order(&mut self, order: &OrderRecord) -> OutputResult<bool>;

    /// Write multiple orders at once, returning how many were new
    fn write_orders(&mut self, orders: &[OrderRecord]) -> OutputResult<usize> {
        let mut written = 0;
        for order in orders {
            if self.write_order(order)? {
                written += 1;
            }
        }
        Ok(written)
    }
}
