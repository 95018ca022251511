use std::sync::Arc;
use std::time::Duration;

use crate::support::{run_stub_with_shutdown, test_config, Step, StubTransport};
use order_fetcher::downloader::FailureKind;
use order_fetcher::shutdown::ShutdownCoordinator;
use order_fetcher::OrderId;
use tempfile::TempDir;

#[tokio::test]
async fn shutdown_notifies_waiters() {
    let shutdown = ShutdownCoordinator::shared();
    let waiter = {
        let handle = shutdown.clone();
        tokio::spawn(async move {
            handle.wait_for_shutdown().await;
            true
        })
    };

    // Give the task time to start waiting
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok());
}

/// Shutdown requested before anyone waits must not be missed.
#[tokio::test]
async fn shutdown_race_condition_no_deadlock() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let handle = shutdown.clone();
    let waiter = tokio::spawn(async move {
        handle.wait_for_shutdown().await;
        true
    });

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok(), "wait_for_shutdown() deadlocked despite shutdown already requested");
}

#[tokio::test]
async fn shutdown_concurrent_waiters_all_notified() {
    let shutdown = ShutdownCoordinator::shared();

    let mut waiters = Vec::new();
    for _ in 0..10 {
        let handle = shutdown.clone();
        waiters.push(tokio::spawn(async move {
            handle.wait_for_shutdown().await;
        }));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.request_shutdown();

    for waiter in waiters {
        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(result.is_ok(), "a waiter was not notified");
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_retries_cancels_every_identifier() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path())
        .with_burst(4)
        .with_max_attempts(10)
        .with_backoff(Duration::from_secs(30));

    let transport = Arc::new(StubTransport::new(Step::Status(503)));
    let shutdown = ShutdownCoordinator::shared();

    let trigger = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            shutdown.request_shutdown();
        })
    };

    let started = tokio::time::Instant::now();
    let ids = (1..=12).map(OrderId::new).collect();
    let (result, observer) = run_stub_with_shutdown(config, ids, transport.clone(), shutdown).await;
    trigger.await.unwrap();
    let summary = result.unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.cancelled, 12);
    assert_eq!(summary.succeeded, 0);
    assert!(
        started.elapsed() < Duration::from_secs(30),
        "run did not stop promptly: {:?}",
        started.elapsed()
    );

    let failures = observer.failures();
    assert_eq!(failures.len(), 12);
    assert!(failures.iter().all(|r| r.kind == FailureKind::Cancelled));

    // The first four were mid-retry; the rest never got a gate slot.
    let with_attempts = failures.iter().filter(|r| r.attempts > 0).count();
    assert_eq!(with_attempts, 4);
    assert_eq!(transport.calls().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_hanging_request() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let transport = Arc::new(StubTransport::new(Step::Hang));
    let shutdown = ShutdownCoordinator::shared();

    let trigger = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            shutdown.request_shutdown();
        })
    };

    let (result, observer) =
        run_stub_with_shutdown(config, vec![OrderId::new(1)], transport, shutdown).await;
    trigger.await.unwrap();
    let summary = result.unwrap();

    assert_eq!(summary.cancelled, 1);
    let attempts = observer.attempts_for(OrderId::new(1));
    assert_eq!(attempts.len(), 1);
    assert_eq!(
        attempts[0].class.error(),
        Some(order_fetcher::downloader::ErrorClass::Cancelled)
    );
}
