//! Integration tests for mivr-peer.
//!
//! The renderer side is the real blocking feedback client from mivr-core,
//! run on a blocking thread against the async peer.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use mivr_core::{
    Driver, DriverConfig, FeedbackClient, Histogram, MetricRecord, NullConsumer, ReplayProvider,
    ReplyRecord, TcpConnector, ViewState,
};
use mivr_peer::{Action, AdvisoryPeer, Policy, ResultsLog, bind, serve};

#[tokio::test]
async fn scripted_peer_steers_the_feedback_client() {
    let listener = bind("127.0.0.1", 0).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let peer = AdvisoryPeer::new(Policy::scripted(vec![Action::RotateCw]));
    let server = tokio::spawn(serve(listener, peer, Some(3), std::future::pending()));

    let view = tokio::task::spawn_blocking(move || {
        let mut client = FeedbackClient::new(TcpConnector::new("127.0.0.1", port));
        let mut view = ViewState::new(10.0, 0.0, -6.0);
        for mi in [1.0, 1.5, 1.25] {
            client.step(&mut view, mi).unwrap();
        }
        view
    })
    .await
    .unwrap();

    assert_eq!(view, ViewState::new(13.0, 0.0, -6.0));

    let summary = server.await.unwrap().unwrap();
    assert_eq!(summary.exchanges, 3);
    assert_eq!(summary.final_reply, Some([13.0, 0.0, -6.0]));
    // (1.5 - 1.0) * 20 - 1, then (1.25 - 1.5) * 20 - 1.
    assert!((summary.total_reward - 3.0).abs() < 1e-4);
}

#[tokio::test]
async fn driver_run_records_every_exchange() {
    let tmp = tempfile::tempdir().unwrap();
    let results = tmp.path().join("LearningResults.csv");

    let listener = bind("127.0.0.1", 0).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let peer = AdvisoryPeer::new(Policy::random(Some(42)))
        .with_results(ResultsLog::open(&results).unwrap());
    let server = tokio::spawn(serve(listener, peer, Some(20), std::future::pending()));

    let summary = tokio::task::spawn_blocking(move || {
        let config = DriverConfig {
            bin_count: 5,
            peer_port: port,
            read_timeout_ms: Some(5_000),
            ..Default::default()
        };
        let provider = ReplayProvider::new(
            Histogram::new(vec![5, 3, 2, 0, 1]),
            vec![
                Histogram::new(vec![1, 1, 1, 1, 1]),
                Histogram::new(vec![9, 0, 0, 0, 1]),
            ],
        )
        .unwrap();
        let mut driver = Driver::from_config(&config, provider, NullConsumer).unwrap();
        driver.run(Some(20)).unwrap()
    })
    .await
    .unwrap();

    assert_eq!(summary.advised, 20);
    let peer_summary = server.await.unwrap().unwrap();
    assert_eq!(peer_summary.exchanges, 20);

    let text = std::fs::read_to_string(&results).unwrap();
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows.len(), 20);
    assert!(rows.iter().all(|r| r.split(',').count() == 5));
    assert!(rows[0].starts_with("0.0,0.0,0.0,-4.0,"));
}

#[tokio::test]
async fn empty_connection_is_dropped_and_peer_keeps_serving() {
    let listener = bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve(
        listener,
        AdvisoryPeer::new(Policy::Hold),
        Some(1),
        std::future::pending(),
    ));

    // Connect and hang up without sending anything.
    drop(TcpStream::connect(addr).await.unwrap());

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(&MetricRecord::new(0.0, 45.0, -7.0, 0.5).encode())
        .await
        .unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    assert_eq!(ReplyRecord::decode(&buf).unwrap(), ReplyRecord::new(0.0, 45.0, -7.0));

    let summary = server.await.unwrap().unwrap();
    assert_eq!(summary.exchanges, 1);
    assert_eq!(summary.dropped_connections, 1);
}
