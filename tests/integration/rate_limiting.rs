//! Integration tests for rate limiting functionality

use crate::support::{run_stub, test_config, Step, StubTransport};
use order_fetcher::downloader::RateLimiter;
use order_fetcher::OrderId;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

/// Largest number of timestamps falling in any half-open window of `window`
fn max_in_any_window(mut times: Vec<Instant>, window: Duration) -> usize {
    times.sort();
    let mut best = 0;
    let mut start = 0;
    for end in 0..times.len() {
        while times[end] - times[start] >= window {
            start += 1;
        }
        best = best.max(end - start + 1);
    }
    best
}

#[test]
fn test_rate_limiter_request_based_initialization() {
    let limiter = RateLimiter::request_based(50, Duration::from_secs(10));
    assert_eq!(limiter.max_requests(), 50);
    assert_eq!(limiter.window(), Duration::from_secs(10));
    assert_eq!(limiter.available(), 50);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_never_exceed_ceiling() {
    let limiter = RateLimiter::per_second(5);
    let passes = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for _ in 0..40 {
        let limiter = limiter.clone();
        let passes = passes.clone();
        handles.push(tokio::spawn(async move {
            limiter.acquire().await;
            passes.lock().unwrap().push(Instant::now());
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let passes = passes.lock().unwrap().clone();
    assert_eq!(passes.len(), 40);
    assert_eq!(max_in_any_window(passes.clone(), Duration::from_secs(1)), 5);

    // 40 passages at 5 per second need at least 7 full windows.
    let first = *passes.iter().min().unwrap();
    let last = *passes.iter().max().unwrap();
    assert!(last - first >= Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_acquire_never_fails_under_pressure() {
    let limiter = RateLimiter::request_based(1, Duration::from_millis(100));
    let start = Instant::now();
    for _ in 0..10 {
        limiter.acquire().await;
    }
    assert!(start.elapsed() >= Duration::from_millis(900));
}

#[tokio::test(start_paused = true)]
async fn test_run_respects_requests_per_second() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path()).with_burst(50).with_max_rps(18);

    let transport = Arc::new(StubTransport::new(Step::Order));
    let ids = (1..=100).map(OrderId::new).collect();
    let (result, _) = run_stub(config, ids, transport.clone()).await;
    assert_eq!(result.unwrap().succeeded, 100);

    let times: Vec<Instant> = transport.calls().into_iter().map(|(_, at)| at).collect();
    assert_eq!(times.len(), 100);
    assert!(max_in_any_window(times, Duration::from_secs(1)) <= 18);
}

#[tokio::test(start_paused = true)]
async fn test_retries_consume_rate_budget() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path())
        .with_burst(20)
        .with_max_rps(4)
        .with_backoff(Duration::ZERO);

    // Every identifier fails once before succeeding: 20 requests for 10 ids.
    let mut transport = StubTransport::new(Step::Order);
    for id in 1..=10 {
        transport = transport.script(id, vec![Step::Status(502), Step::Order]);
    }
    let transport = Arc::new(transport);

    let ids = (1..=10).map(OrderId::new).collect();
    let (result, _) = run_stub(config, ids, transport.clone()).await;
    assert_eq!(result.unwrap().succeeded, 10);

    let times: Vec<Instant> = transport.calls().into_iter().map(|(_, at)| at).collect();
    assert_eq!(times.len(), 20);
    assert!(max_in_any_window(times, Duration::from_secs(1)) <= 4);
}
