//! Fetch command implementation

use crate::downloader::config::{
    DEFAULT_BASE_URL, DEFAULT_BURST, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_RPS, DEFAULT_OUTPUT,
    MAX_ATTEMPTS, MAX_BURST,
};
use crate::downloader::{run_with_shutdown, FetchConfig, OutputOrder, RunSummary};
use crate::identifier::IdSet;
use crate::shutdown::SharedShutdown;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::CliError;

/// Parse and validate burst size
fn parse_burst(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("burst must be at least 1".to_string());
    }
    if value > MAX_BURST {
        return Err(format!("burst {value} exceeds maximum of {MAX_BURST}"));
    }
    Ok(value)
}

/// Parse a non-negative number of seconds
fn parse_seconds(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number of seconds"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("'{s}' must be a non-negative number of seconds"));
    }
    Ok(value)
}

fn seconds(name: &str, value: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| CliError::InvalidArgument(format!("{name}: {e}")))
}

/// Summary format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for SummaryFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(SummaryFormat::Json),
            "human" => Ok(SummaryFormat::Human),
            _ => Err(format!("Invalid summary format: {s}")),
        }
    }
}

/// Order Fetcher CLI
#[derive(Parser, Debug)]
#[command(name = "order-fetcher")]
#[command(
    about = "Fetch orders by identifier from a REST service into a CSV file",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Service root URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Identifiers to fetch: ranges and lists, e.g. "1-10,15,20-22"
    #[arg(long, default_value = "1-1000")]
    pub ids: String,

    /// CSV output path
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Maximum in-flight fetches
    #[arg(long, default_value_t = DEFAULT_BURST, value_parser = parse_burst)]
    pub burst: usize,

    /// Maximum requests per second across all fetches
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_RPS,
        value_parser = clap::value_parser!(u32).range(1..=10_000)
    )]
    pub max_rps: u32,

    /// Attempts per identifier, including the first
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..=MAX_ATTEMPTS as i64)
    )]
    pub max_attempts: u32,

    /// Base backoff in seconds for 5xx, transport errors and 429 without Retry-After
    #[arg(long, default_value_t = 1.0, value_parser = parse_seconds)]
    pub backoff_secs: f64,

    /// Cap in seconds on server-supplied Retry-After waits (uncapped by default)
    #[arg(long, value_parser = parse_seconds)]
    pub max_retry_after_secs: Option<f64>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 5.0, value_parser = parse_seconds)]
    pub timeout_secs: f64,

    /// TCP connect timeout in seconds
    #[arg(long, default_value_t = 5.0, value_parser = parse_seconds)]
    pub connect_timeout_secs: f64,

    /// Write rows sorted by identifier when the run ends instead of as they complete
    #[arg(long)]
    pub sort_by_id: bool,

    /// Summary format on stdout (json or human)
    #[arg(long, default_value = "human")]
    pub summary_format: SummaryFormat,

    /// Serve Prometheus metrics on this address (e.g. 0.0.0.0:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Build the run configuration from the arguments
    pub fn to_config(&self) -> Result<FetchConfig, CliError> {
        let order = if self.sort_by_id {
            OutputOrder::Identifier
        } else {
            OutputOrder::Completion
        };

        let mut config = FetchConfig::new(self.base_url.clone(), self.output.clone())
            .with_burst(self.burst)
            .with_max_rps(self.max_rps)
            .with_max_attempts(self.max_attempts)
            .with_backoff(seconds("backoff-secs", self.backoff_secs)?)
            .with_timeouts(
                seconds("timeout-secs", self.timeout_secs)?,
                seconds("connect-timeout-secs", self.connect_timeout_secs)?,
            )
            .with_output_order(order);
        if let Some(cap) = self.max_retry_after_secs {
            config = config.with_max_retry_after(seconds("max-retry-after-secs", cap)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Run the fetch and print the summary
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<RunSummary, CliError> {
        let config = self.to_config()?;
        let ids = IdSet::parse(&self.ids)?;

        info!(
            "Fetching {} orders from {} into {}",
            ids.len(),
            config.base_url,
            config.output_path.display()
        );

        let summary = run_with_shutdown(config, ids.into_vec(), shutdown).await?;
        match self.summary_format {
            SummaryFormat::Json => output_json(&summary, &self.output)?,
            SummaryFormat::Human => output_human(&summary, &self.output),
        }
        Ok(summary)
    }
}

/// Output summary as JSON
fn output_json(summary: &RunSummary, output: &std::path::Path) -> Result<(), CliError> {
    let mut value = serde_json::to_value(summary)
        .map_err(|e| CliError::InvalidArgument(format!("Failed to encode summary: {e}")))?;
    value["output_path"] = serde_json::Value::String(output.display().to_string());
    println!("{value}");
    Ok(())
}

/// Output summary in human-readable format
fn output_human(summary: &RunSummary, output: &std::path::Path) {
    println!("\nFetch completed!");
    println!("Output: {}", output.display());
    println!("Orders saved: {}/{}", summary.succeeded, summary.total);
    if summary.failed > 0 {
        println!("Failed: {}", summary.failed);
        for (kind, count) in &summary.failures_by_kind {
            println!("  {kind}: {count}");
        }
    }
    if summary.cancelled > 0 {
        println!("Cancelled: {}", summary.cancelled);
    }
    println!("Attempts: {}", summary.attempts);
    println!("Elapsed: {:.1}s", summary.elapsed_secs);
}
