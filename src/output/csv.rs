//! CSV output writer for orders

use crate::OrderRecord;
use chrono::SecondsFormat;
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{OrdersWriter, OutputError, OutputResult, OutputWriter};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Column header, written once when the file is created
pub const CSV_HEADER: [&str; 9] = [
    "order_id",
    "account_id",
    "company",
    "status",
    "currency",
    "subtotal",
    "tax",
    "total",
    "created_at",
];

/// CSV record for one order
#[derive(Debug, Serialize)]
struct OrderRow {
    order_id: u64,
    account_id: u64,
    company: String,
    status: String,
    currency: String,
    subtotal: String,
    tax: String,
    total: String,
    created_at: String,
}

impl From<&OrderRecord> for OrderRow {
    fn from(order: &OrderRecord) -> Self {
        Self {
            order_id: order.order_id,
            account_id: order.account_id,
            company: order.company.clone(),
            status: order.status.to_string(),
            currency: order.currency.to_string(),
            subtotal: order.subtotal.to_string(),
            tax: order.tax.to_string(),
            total: order.total.to_string(),
            created_at: order.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

/// CSV writer for orders
///
/// Skips any order whose identifier was already written.
pub struct CsvOrdersWriter {
    writer: Writer<BufWriter<File>>,
    path: PathBuf,
    orders_written: u64,
    seen_ids: HashSet<u64>,
    duplicates_skipped: u64,
}

impl CsvOrdersWriter {
    /// Create the file (and parent directories) and write the header
    ///
    /// An existing file at `path` is truncated.
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        Self::new_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Create a new CSV writer with custom buffer size
    pub fn new_with_buffer_size<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating CSV writer: path={}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;

        let buf_writer = BufWriter::with_capacity(buffer_size, file);
        let mut csv_writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(buf_writer);

        // Header goes out even if no order is ever written.
        csv_writer
            .write_record(CSV_HEADER)
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {e}")))?;
        csv_writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush header: {e}")))?;
        debug!("CSV header written");

        Ok(Self {
            writer: csv_writer,
            path: path.to_path_buf(),
            orders_written: 0,
            seen_ids: HashSet::new(),
            duplicates_skipped: 0,
        })
    }

    /// Output path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get number of orders written so far
    pub fn orders_written(&self) -> u64 {
        self.orders_written
    }

    /// Get number of duplicate orders skipped
    pub fn duplicates_skipped(&self) -> u64 {
        self.duplicates_skipped
    }
}

impl OrdersWriter for CsvOrdersWriter {
    fn write_order(&mut self, order: &OrderRecord) -> OutputResult<bool> {
        if !self.seen_ids.insert(order.order_id) {
            self.duplicates_skipped += 1;
            warn!(order_id = order.order_id, "Skipping duplicate order");
            return Ok(false);
        }

        self.writer
            .serialize(OrderRow::from(order))
            .map_err(|e| OutputError::CsvError(format!("Failed to write order: {e}")))?;

        self.orders_written += 1;
        Ok(true)
    }
}

impl OutputWriter for CsvOrdersWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))
    }

    fn close(mut self) -> OutputResult<()> {
        debug!("Closing CSV writer: {} total orders written", self.orders_written);

        self.flush()?;

        let buf_writer = self.writer.into_inner().map_err(|e| {
            OutputError::IoError(format!("Failed to get inner writer: {e}"))
        })?;

        let file = buf_writer.into_inner().map_err(|e| {
            OutputError::IoError(format!("Failed to get file handle: {e}"))
        })?;

        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {e}")))?;

        info!(
            "CSV writer closed successfully: {} orders written, {} duplicates skipped",
            self.orders_written, self.duplicates_skipped
        );
        Ok(())
    }
}
