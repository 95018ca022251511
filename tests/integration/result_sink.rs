//! Result sink durability under concurrent completion

use crate::support::{order_json, read_rows};
use order_fetcher::downloader::{FetchOutcome, OutputOrder};
use order_fetcher::events::RecordingObserver;
use order_fetcher::fetcher::order_parser::OrderParser;
use order_fetcher::output::ResultSink;
use order_fetcher::OrderId;
use std::sync::Arc;
use tempfile::TempDir;

fn success(id: u64) -> FetchOutcome {
    FetchOutcome::Success {
        record: OrderParser::parse(order_json(id).as_bytes(), OrderId::new(id)).unwrap(),
        attempts: 1,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_successes_produce_well_formed_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders.csv");
    let sink = Arc::new(
        ResultSink::create(&path, OutputOrder::Completion, Arc::new(RecordingObserver::new()))
            .unwrap(),
    );

    let mut handles = Vec::new();
    for id in 1..=250u64 {
        let sink = sink.clone();
        handles.push(tokio::spawn(async move {
            sink.record(&success(id)).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    sink.close().await.unwrap();

    let rows = read_rows(&path);
    assert_eq!(rows.len(), 250);
    assert!(rows.iter().all(|row| row.len() == 9));

    let mut ids: Vec<u64> = rows.iter().map(|row| row[0].parse().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=250).collect::<Vec<_>>());

    let header = std::fs::read_to_string(&path).unwrap();
    assert!(header.starts_with(
        "order_id,account_id,company,status,currency,subtotal,tax,total,created_at\n"
    ));
}

#[tokio::test]
async fn test_rows_flushed_as_they_arrive() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders.csv");
    let sink = ResultSink::create(
        &path,
        OutputOrder::Completion,
        Arc::new(RecordingObserver::new()),
    )
    .unwrap();

    for id in [10, 20, 30] {
        sink.record(&success(id)).await.unwrap();
        assert_eq!(read_rows(&path).len(), (id / 10) as usize);
    }
    sink.close().await.unwrap();
}

#[tokio::test]
async fn test_existing_file_is_replaced() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("orders.csv");
    std::fs::write(&path, "stale,data\n1,2\n").unwrap();

    let sink = ResultSink::create(
        &path,
        OutputOrder::Completion,
        Arc::new(RecordingObserver::new()),
    )
    .unwrap();
    sink.record(&success(1)).await.unwrap();
    sink.close().await.unwrap();

    let rows = read_rows(&path);
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][0], "1");
}
