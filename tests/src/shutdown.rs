//! Shutdown integration tests
//!
//! After stop the registry is empty, every handle reports closed and the
//! gNB side sees its connection end.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use integration_tests::{
    init_test_logging, mock_config, read_reply, setup_request, test_fixtures::bridge_config,
    wait_for_condition, EchoAmf, LoopbackTransport, RunningBridge, DEFAULT_POLL_INTERVAL,
    DEFAULT_TEST_TIMEOUT,
};
use ngbridge_amf::ConnectionHandle;

/// Reads until EOF or error; true if the stream ended within `within`
async fn sees_close(stream: &mut TcpStream, within: Duration) -> bool {
    let mut buf = [0u8; 256];
    timeout(within, async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                // Liveness probes may still arrive before the close
                Ok(_) => continue,
            }
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn test_stop_closes_every_connection() {
    init_test_logging();
    let running = RunningBridge::start(mock_config()).await.unwrap();

    let mut gnbs = Vec::new();
    for _ in 0..3 {
        gnbs.push(TcpStream::connect(running.addr).await.unwrap());
    }
    // One of them completes NG Setup first
    gnbs[0].write_all(&setup_request()).await.unwrap();
    read_reply(&mut gnbs[0], DEFAULT_TEST_TIMEOUT).await.unwrap();

    let registry = running.bridge.registry().clone();
    wait_for_condition(
        || {
            let registry = registry.clone();
            async move { registry.len() == 3 }
        },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .unwrap();
    let handles = registry.snapshot();

    let started = Instant::now();
    let closed = running.stop(Duration::from_secs(1)).await.unwrap();

    assert_eq!(closed, 3);
    assert!(registry.is_empty());
    assert!(handles.iter().all(ConnectionHandle::is_closed));
    // Bounded by the largest configured wait
    assert!(started.elapsed() < Duration::from_secs(1));

    for gnb in &mut gnbs {
        assert!(sees_close(gnb, Duration::from_secs(1)).await);
    }
}

#[tokio::test]
async fn test_stop_closes_bridged_connections() {
    init_test_logging();
    let amf = EchoAmf::start().await.unwrap();
    let running = RunningBridge::start_with_transport(
        bridge_config(amf.addr()),
        Arc::new(LoopbackTransport::new()),
    )
    .await
    .unwrap();

    let mut gnb = TcpStream::connect(running.addr).await.unwrap();
    gnb.write_all(b"hello").await.unwrap();
    let mut echoed = [0u8; 5];
    timeout(DEFAULT_TEST_TIMEOUT, gnb.read_exact(&mut echoed))
        .await
        .unwrap()
        .unwrap();

    let registry = running.bridge.registry().clone();
    let handles = registry.snapshot();
    assert_eq!(handles.len(), 1);

    running.stop(Duration::from_secs(1)).await.unwrap();
    assert!(registry.is_empty());
    assert!(handles[0].is_closed());
    assert!(sees_close(&mut gnb, Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_stop_with_no_connections() {
    init_test_logging();
    let running = RunningBridge::start(mock_config()).await.unwrap();
    let addr = running.addr;

    assert_eq!(running.stop(Duration::from_secs(1)).await.unwrap(), 0);

    // The listener is gone once the accept loop returns
    assert!(TcpStream::connect(addr).await.is_err());
}
