//! Mock mode integration tests
//!
//! gNBs connect to a bridge that cannot reach an AMF and are answered by the
//! mock AMF.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use integration_tests::{
    garbage_message, init_test_logging, mock_config, read_reply, setup_request,
    wait_for_condition, RunningBridge, DEFAULT_POLL_INTERVAL, DEFAULT_TEST_TIMEOUT,
};
use ngbridge_ngap::{build_setup_success, PduType, LIVENESS_PROBE, UNRECOGNIZED_CAUSE};

/// A valid NG Setup Request gets the NG Setup Response
#[tokio::test]
async fn test_mock_setup_success() {
    init_test_logging();
    let running = RunningBridge::start(mock_config()).await.unwrap();

    let mut gnb = TcpStream::connect(running.addr).await.unwrap();
    gnb.write_all(&setup_request()).await.unwrap();

    let reply = read_reply(&mut gnb, DEFAULT_TEST_TIMEOUT).await.unwrap();
    assert_eq!(reply, build_setup_success().as_bytes());

    running.stop(Duration::from_secs(1)).await.unwrap();
}

/// Two gNBs at once: one valid, one garbage. Each gets its own answer.
#[tokio::test]
async fn test_concurrent_connections_answered_independently() {
    init_test_logging();
    let running = RunningBridge::start(mock_config()).await.unwrap();

    let mut good = TcpStream::connect(running.addr).await.unwrap();
    let mut bad = TcpStream::connect(running.addr).await.unwrap();

    let registry = running.bridge.registry().clone();
    wait_for_condition(
        || {
            let registry = registry.clone();
            async move { registry.len() == 2 }
        },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .expect("both connections registered");

    let (good_reply, bad_reply) = tokio::join!(
        async {
            good.write_all(&setup_request()).await.unwrap();
            read_reply(&mut good, DEFAULT_TEST_TIMEOUT).await.unwrap()
        },
        async {
            bad.write_all(&garbage_message()).await.unwrap();
            read_reply(&mut bad, DEFAULT_TEST_TIMEOUT).await.unwrap()
        },
    );

    assert_eq!(good_reply[0], PduType::SuccessfulOutcome as u8);
    assert_eq!(bad_reply[0], PduType::UnsuccessfulOutcome as u8);
    assert!(bad_reply.ends_with(UNRECOGNIZED_CAUSE.as_bytes()));

    // The failed gNB may retry on the same connection
    bad.write_all(&setup_request()).await.unwrap();
    let retry = read_reply(&mut bad, DEFAULT_TEST_TIMEOUT).await.unwrap();
    assert_eq!(retry[0], PduType::SuccessfulOutcome as u8);

    running.stop(Duration::from_secs(1)).await.unwrap();
}

/// An established session that goes quiet gets liveness probes
#[tokio::test]
async fn test_liveness_probe_after_receive_timeout() {
    init_test_logging();
    let running = RunningBridge::start(mock_config()).await.unwrap();

    let mut gnb = TcpStream::connect(running.addr).await.unwrap();
    gnb.write_all(&setup_request()).await.unwrap();
    read_reply(&mut gnb, DEFAULT_TEST_TIMEOUT).await.unwrap();

    // The probe's declared length is zero, so it reads as one empty message
    let probe = read_reply(&mut gnb, Duration::from_secs(2)).await.unwrap();
    assert_eq!(probe, LIVENESS_PROBE);

    running.stop(Duration::from_secs(1)).await.unwrap();
}

/// A gNB that hangs up is removed from the registry
#[tokio::test]
async fn test_peer_close_unregisters() {
    init_test_logging();
    let running = RunningBridge::start(mock_config()).await.unwrap();

    let gnb = TcpStream::connect(running.addr).await.unwrap();
    let registry = running.bridge.registry().clone();
    wait_for_condition(
        || {
            let registry = registry.clone();
            async move { registry.len() == 1 }
        },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .unwrap();

    drop(gnb);
    wait_for_condition(
        || {
            let registry = registry.clone();
            async move { registry.is_empty() }
        },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .expect("connection not removed after peer close");

    running.stop(Duration::from_secs(1)).await.unwrap();
}
