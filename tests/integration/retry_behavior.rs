//! Retry policy behaviour observed through full runs

use crate::support::{ids, run_stub, test_config, Step, StubTransport};
use order_fetcher::downloader::{ErrorClass, FailureKind};
use order_fetcher::OrderId;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test(start_paused = true)]
async fn test_retry_after_header_is_honoured() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        StubTransport::new(Step::Order).script(9, vec![Step::RateLimited(Some("3")), Step::Order]),
    );

    let (result, observer) = run_stub(test_config(dir.path()), ids(&[9]), transport.clone()).await;
    assert_eq!(result.unwrap().succeeded, 1);

    let times = transport.call_times(9);
    assert_eq!(times.len(), 2);
    assert!(
        times[1] - times[0] >= Duration::from_secs(3),
        "second attempt came after {:?}",
        times[1] - times[0]
    );

    let retries = observer.retries_for(OrderId::new(9));
    assert_eq!(retries[0].retry_wait(), Some(Duration::from_secs(3)));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_retry_after_falls_back_to_base_backoff() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        StubTransport::new(Step::Order)
            .script(5, vec![Step::RateLimited(Some("abc")), Step::Order]),
    );

    let (result, observer) = run_stub(test_config(dir.path()), ids(&[5]), transport.clone()).await;
    assert_eq!(result.unwrap().succeeded, 1);

    let times = transport.call_times(5);
    assert!(times[1] - times[0] >= Duration::from_secs(1));
    assert_eq!(
        observer.retries_for(OrderId::new(5))[0].retry_wait(),
        Some(Duration::from_secs(1))
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_retry_after_uses_base_backoff() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path()).with_backoff(Duration::from_millis(250));
    let transport = Arc::new(
        StubTransport::new(Step::Order).script(5, vec![Step::RateLimited(None), Step::Order]),
    );

    let (result, observer) = run_stub(config, ids(&[5]), transport).await;
    assert_eq!(result.unwrap().succeeded, 1);
    assert_eq!(
        observer.retries_for(OrderId::new(5))[0].retry_wait(),
        Some(Duration::from_millis(250))
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_is_capped() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path()).with_max_retry_after(Duration::from_secs(10));
    let transport = Arc::new(
        StubTransport::new(Step::Order)
            .script(6, vec![Step::RateLimited(Some("86400")), Step::Order]),
    );

    let (result, observer) = run_stub(config, ids(&[6]), transport).await;
    assert_eq!(result.unwrap().succeeded, 1);
    assert_eq!(
        observer.retries_for(OrderId::new(6))[0].retry_wait(),
        Some(Duration::from_secs(10))
    );
}

#[tokio::test(start_paused = true)]
async fn test_long_retry_after_is_not_capped_by_default() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        StubTransport::new(Step::Order)
            .script(10, vec![Step::RateLimited(Some("300")), Step::Order]),
    );

    let (result, observer) =
        run_stub(test_config(dir.path()), ids(&[10]), transport.clone()).await;
    assert_eq!(result.unwrap().succeeded, 1);

    let times = transport.call_times(10);
    assert!(
        times[1] - times[0] >= Duration::from_secs(300),
        "second attempt came after {:?}",
        times[1] - times[0]
    );
    assert_eq!(
        observer.retries_for(OrderId::new(10))[0].retry_wait(),
        Some(Duration::from_secs(300))
    );
}

#[tokio::test(start_paused = true)]
async fn test_server_errors_exhaust_retries() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path()).with_max_attempts(4);
    let transport = Arc::new(StubTransport::new(Step::Status(503)));

    let (result, observer) = run_stub(config, ids(&[7]), transport.clone()).await;
    let summary = result.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.attempts, 4);
    assert_eq!(transport.call_count(7), 4);

    let failures = observer.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::RetryExhausted);
    assert_eq!(failures[0].last_error, Some(ErrorClass::ServerError(503)));
    assert_eq!(failures[0].attempts, 4);
    assert_eq!(failures[0].detail, "HTTP 503");

    // Attempts 1-3 scheduled a retry; attempt 4 did not.
    let attempts = observer.attempts_for(OrderId::new(7));
    assert_eq!(attempts.len(), 4);
    assert_eq!(observer.retries_for(OrderId::new(7)).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_are_retried() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        StubTransport::new(Step::Order)
            .script(8, vec![Step::Refused, Step::Timeout, Step::Order]),
    );

    let (result, observer) = run_stub(test_config(dir.path()), ids(&[8]), transport.clone()).await;
    assert_eq!(result.unwrap().succeeded, 1);

    let retries = observer.retries_for(OrderId::new(8));
    let classes: Vec<_> = retries.iter().map(|e| e.class.error()).collect();
    assert_eq!(
        classes,
        vec![
            Some(ErrorClass::NetworkOffline),
            Some(ErrorClass::NetworkTimeout)
        ]
    );

    let times = transport.call_times(8);
    assert!(times[1] - times[0] >= Duration::from_secs(1));
    assert!(times[2] - times[1] >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_client_errors_are_not_retried() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        StubTransport::new(Step::Status(400))
            .script(2, vec![Step::Status(403)])
            .script(3, vec![Step::Status(301)]),
    );

    let (result, observer) =
        run_stub(test_config(dir.path()), ids(&[1, 2, 3]), transport.clone()).await;
    assert_eq!(result.unwrap().failed, 3);

    for id in [1, 2, 3] {
        assert_eq!(transport.call_count(id), 1);
    }
    assert!(observer
        .failures()
        .iter()
        .all(|report| report.kind == FailureKind::FatalClientError));
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_policy() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path()).with_max_attempts(1);
    let transport = Arc::new(StubTransport::new(Step::RateLimited(Some("1"))));

    let (result, observer) = run_stub(config, ids(&[1]), transport.clone()).await;
    assert_eq!(result.unwrap().failed, 1);
    assert_eq!(transport.call_count(1), 1);
    assert_eq!(observer.failures()[0].kind, FailureKind::RetryExhausted);
}
