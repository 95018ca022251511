//! # Order Fetcher Library
//!
//! A bounded-concurrency, rate-limited HTTP fetcher that retrieves many
//! independent orders by numeric identifier, retries transient failures with a
//! uniform policy, and streams validated results into a CSV file.
//!
//! ## Quick Start
//!
//! ```no_run
//! use order_fetcher::downloader::{FetchConfig, run};
//! use order_fetcher::identifier::IdSet;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::new("http://127.0.0.1:8000", "./orders.csv")
//!     .with_burst(50)
//!     .with_max_rps(18)
//!     .with_max_attempts(3);
//!
//! let ids = IdSet::parse("1-1000")?;
//! let summary = run(config, ids.into_vec()).await?;
//! println!("{} orders saved", summary.succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`identifier`] - Order identifiers and identifier set parsing (`1-10,15`)
//! - [`fetcher`] - HTTP transport seam, response parsing, retry message formatting
//! - [`downloader`] - Rate limiter, concurrency gate, retry policy, worker and executor
//! - [`output`] - CSV writer and the concurrent result sink
//! - [`events`] - Observability stream for attempts and terminal failures
//! - [`metrics`] - Prometheus-backed counters and histograms
//! - [`shutdown`] - Cancellation signal shared by every worker
//!
//! ## Data Types
//!
//! - [`OrderRecord`] - One decoded order, the unit written to the CSV output
//! - [`OrderStatus`] / [`Currency`] - Closed vocabularies used by the order schema

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementation
pub mod cli;

/// Fetch orchestration: rate limiting, concurrency, retries
pub mod downloader;

/// Observability stream for attempts and failures
pub mod events;

/// HTTP transport and response parsing
pub mod fetcher;

/// Order identifiers and identifier sets
pub mod identifier;

/// Prometheus metrics
pub mod metrics;

/// Output writers and the result sink
pub mod output;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use identifier::OrderId;

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order has been created
    Created,
    /// Order has been confirmed
    Confirmed,
    /// Order has been invoiced
    Invoiced,
    /// Order has been paid
    Paid,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Created => "created",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Invoiced => "invoiced",
            OrderStatus::Paid => "paid",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(OrderStatus::Created),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "invoiced" => Ok(OrderStatus::Invoiced),
            "paid" => Ok(OrderStatus::Paid),
            _ => Err(format!("Invalid order status: {s}")),
        }
    }
}

/// Settlement currency of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// US dollar
    #[serde(rename = "USD")]
    Usd,
    /// Euro
    #[serde(rename = "EUR")]
    Eur,
    /// Pound sterling
    #[serde(rename = "GBP")]
    Gbp,
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            _ => Err(format!("Invalid currency: {s}")),
        }
    }
}

/// Decoded order, created only from a 2xx response with a valid body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRecord {
    /// Order identifier (matches the requested identifier)
    pub order_id: u64,
    /// Owning account
    pub account_id: u64,
    /// Company name on the account
    pub company: String,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Settlement currency
    pub currency: Currency,
    /// Sum of line amounts before tax
    pub subtotal: Decimal,
    /// Tax amount
    pub tax: Decimal,
    /// Subtotal plus tax
    pub total: Decimal,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Validate order data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.company.trim().is_empty() {
            return Err("Company cannot be empty".to_string());
        }

        if self.subtotal < Decimal::ZERO {
            return Err(format!("Subtotal must be non-negative, got {}", self.subtotal));
        }

        if self.tax < Decimal::ZERO {
            return Err(format!("Tax must be non-negative, got {}", self.tax));
        }

        if self.total < Decimal::ZERO {
            return Err(format!("Total must be non-negative, got {}", self.total));
        }

        Ok(())
    }
}
