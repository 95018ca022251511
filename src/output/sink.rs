//! Concurrent result sink
//!
//! Workers complete in any order; [`ResultSink::record`] serializes their
//! outcomes onto a single [`CsvOrdersWriter`] behind an async mutex. In
//! completion order each row is flushed to the OS before `record` returns.
//! In identifier order rows are buffered and written sorted on close.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::csv::CsvOrdersWriter;
use super::{OrdersWriter, OutputError, OutputResult, OutputWriter};
use crate::downloader::config::OutputOrder;
use crate::downloader::FetchOutcome;
use crate::events::AttemptObserver;
use crate::metrics;
use crate::OrderRecord;

struct SinkState {
    writer: Option<CsvOrdersWriter>,
    pending: BTreeMap<u64, OrderRecord>,
    stored: u64,
    failures: u64,
}

/// Durable destination for fetch outcomes
pub struct ResultSink {
    state: Mutex<SinkState>,
    observer: Arc<dyn AttemptObserver>,
    order: OutputOrder,
    path: PathBuf,
}

impl ResultSink {
    /// Create the output file (header included) and the sink around it
    ///
    /// # Errors
    /// Returns an error if the file or its parent directories cannot be created.
    pub fn create(
        path: impl AsRef<Path>,
        order: OutputOrder,
        observer: Arc<dyn AttemptObserver>,
    ) -> OutputResult<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = CsvOrdersWriter::new(&path)?;
        Ok(Self {
            state: Mutex::new(SinkState {
                writer: Some(writer),
                pending: BTreeMap::new(),
                stored: 0,
                failures: 0,
            }),
            observer,
            order,
            path,
        })
    }

    /// Output path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one terminal outcome
    ///
    /// Successes become rows; failures go to the observer only.
    ///
    /// # Errors
    /// Returns an error if the row cannot be written or flushed, or if the
    /// sink is already closed.
    pub async fn record(&self, outcome: &FetchOutcome) -> OutputResult<()> {
        let mut state = self.state.lock().await;
        if state.writer.is_none() {
            return Err(OutputError::Closed);
        }

        match outcome {
            FetchOutcome::Success { record, attempts } => {
                let stored = match self.order {
                    OutputOrder::Completion => {
                        let writer = state.writer.as_mut().ok_or(OutputError::Closed)?;
                        let written = writer.write_order(record)?;
                        writer.flush()?;
                        written
                    }
                    OutputOrder::Identifier => {
                        if state.pending.contains_key(&record.order_id) {
                            warn!(order_id = record.order_id, "Skipping duplicate order");
                            false
                        } else {
                            state.pending.insert(record.order_id, record.clone());
                            true
                        }
                    }
                };
                if stored {
                    state.stored += 1;
                    metrics::record_outcome(None);
                }
                debug!(
                    order_id = record.order_id,
                    attempts = *attempts,
                    "Order recorded"
                );
            }
            FetchOutcome::Failure(report) => {
                metrics::record_outcome(Some(report.kind));
                state.failures += 1;
                self.observer.on_failure(report);
            }
        }
        Ok(())
    }

    /// Orders stored so far (buffered rows included)
    pub async fn stored(&self) -> u64 {
        self.state.lock().await.stored
    }

    /// Failures recorded so far
    pub async fn failures(&self) -> u64 {
        self.state.lock().await.failures
    }

    /// Write any buffered rows, flush and fsync the file
    ///
    /// Calling `close` again is a no-op.
    ///
    /// # Errors
    /// Returns an error if buffered rows cannot be written or the file cannot be synced.
    pub async fn close(&self) -> OutputResult<()> {
        let mut state = self.state.lock().await;
        let Some(mut writer) = state.writer.take() else {
            return Ok(());
        };

        let pending = std::mem::take(&mut state.pending);
        if !pending.is_empty() {
            info!("Writing {} buffered orders sorted by identifier", pending.len());
            for record in pending.values() {
                writer.write_order(record)?;
            }
        }

        writer.close()
    }
}
