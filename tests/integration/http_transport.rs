//! reqwest transport against a mock HTTP server

use crate::support::{ids, order_json, read_ids};
use order_fetcher::downloader::{run_with, ErrorClass, FailureKind, FetchConfig};
use order_fetcher::events::RecordingObserver;
use order_fetcher::fetcher::{ReqwestTransport, Transport, TransportErrorKind};
use order_fetcher::shutdown::ShutdownCoordinator;
use order_fetcher::OrderId;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(Duration::from_secs(2), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_transport_returns_status_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item/7"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "2")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let response = transport()
        .get(&format!("{}/item/7", server.uri()))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.retry_after(), Some("2"));
    assert_eq!(response.body, b"slow down");
}

#[tokio::test]
async fn test_transport_timeout_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let transport =
        ReqwestTransport::new(Duration::from_secs(1), Duration::from_millis(100)).unwrap();
    let err = transport
        .get(&format!("{}/item/1", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::Timeout);
}

#[tokio::test]
async fn test_full_run_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/item/2"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item/4"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(1)
        .mount(&server)
        .await;
    for id in 1..=3u64 {
        Mock::given(method("GET"))
            .and(path(format!("/item/{id}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(order_json(id), "application/json"),
            )
            .with_priority(2)
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("orders.csv");
    let config = FetchConfig::new(server.uri(), &output)
        .with_burst(4)
        .with_max_rps(50)
        .with_backoff(Duration::from_millis(50));
    let observer = Arc::new(RecordingObserver::new());

    let summary = run_with(
        config,
        ids(&[1, 2, 3, 4]),
        Arc::new(transport()),
        observer.clone(),
        ShutdownCoordinator::shared(),
    )
    .await
    .unwrap();

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 1);

    let mut written = read_ids(&output);
    written.sort_unstable();
    assert_eq!(written, vec![1, 2, 3]);

    assert_eq!(observer.retries_for(OrderId::new(2)).len(), 1);
    let failures = observer.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::FatalClientError);
    assert_eq!(failures[0].last_error, Some(ErrorClass::ClientError(404)));
}

#[tokio::test]
async fn test_connection_refused_exhausts_retries() {
    // Bind then drop a listener to get a port nobody is serving.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = TempDir::new().unwrap();
    let config = FetchConfig::new(format!("http://{addr}"), dir.path().join("orders.csv"))
        .with_max_attempts(2)
        .with_backoff(Duration::from_millis(10));
    let observer = Arc::new(RecordingObserver::new());

    let summary = run_with(
        config,
        ids(&[1]),
        Arc::new(transport()),
        observer.clone(),
        ShutdownCoordinator::shared(),
    )
    .await
    .unwrap();

    assert_eq!(summary.failed, 1);
    let failures = observer.failures();
    assert_eq!(failures[0].kind, FailureKind::RetryExhausted);
    assert_eq!(failures[0].attempts, 2);
    assert!(failures[0].last_error.is_some_and(|class| class.is_retryable()));
}

#[tokio::test]
async fn test_base_url_with_path_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/item/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(order_json(5), "application/json"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("orders.csv");
    let config = FetchConfig::new(format!("{}/api/", server.uri()), &output);

    let summary = run_with(
        config,
        ids(&[5]),
        Arc::new(transport()),
        Arc::new(RecordingObserver::new()),
        ShutdownCoordinator::shared(),
    )
    .await
    .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(read_ids(&output), vec![5]);
}
