//! Bridge mode integration tests
//!
//! The AMF echoes, so whatever a gNB sends must come back to it unmodified
//! through the bridge. Most scenarios use a TCP loopback transport; the SCTP
//! ones go through the bridge's own transports.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use integration_tests::{
    garbage_message, init_test_logging, setup_request, test_fixtures::bridge_config,
    wait_for_condition, EchoAmf, LoopbackTransport, RunningBridge, UdpSctpEchoAmf,
    DEFAULT_POLL_INTERVAL, DEFAULT_TEST_TIMEOUT,
};
use ngbridge_amf::{AmfBridge, BridgeMode, UnavailableTransport};
use ngbridge_common::{AmfTransport, BridgeConfig};

async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    timeout(DEFAULT_TEST_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .expect("no data within timeout")
        .unwrap();
    buf
}

/// Bytes pass through unmodified in both directions
#[tokio::test]
async fn test_bridge_echo_round_trip() {
    init_test_logging();
    let amf = EchoAmf::start().await.unwrap();
    let transport = Arc::new(LoopbackTransport::new());
    let running = RunningBridge::start_with_transport(bridge_config(amf.addr()), transport.clone())
        .await
        .unwrap();

    assert_eq!(running.bridge.announce_mode().await, BridgeMode::Bridge);

    let mut gnb = TcpStream::connect(running.addr).await.unwrap();

    // Not answered locally: the echo returns the request itself
    let request = setup_request();
    gnb.write_all(&request).await.unwrap();
    assert_eq!(read_exactly(&mut gnb, request.len()).await, request);

    // Arbitrary bytes are relayed as well
    let garbage = garbage_message();
    gnb.write_all(&garbage).await.unwrap();
    assert_eq!(read_exactly(&mut gnb, garbage.len()).await, garbage);

    let payload: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
    gnb.write_all(&payload).await.unwrap();
    assert_eq!(read_exactly(&mut gnb, payload.len()).await, payload);

    // One probe at announce, one for the connection
    assert_eq!(transport.probes(), 2);

    running.stop(Duration::from_secs(1)).await.unwrap();
}

/// Each gNB gets its own AMF session
#[tokio::test]
async fn test_bridge_sessions_are_per_connection() {
    init_test_logging();
    let amf = EchoAmf::start().await.unwrap();
    let running = RunningBridge::start_with_transport(
        bridge_config(amf.addr()),
        Arc::new(LoopbackTransport::new()),
    )
    .await
    .unwrap();

    let mut first = TcpStream::connect(running.addr).await.unwrap();
    let mut second = TcpStream::connect(running.addr).await.unwrap();

    first.write_all(b"first").await.unwrap();
    second.write_all(b"second").await.unwrap();
    assert_eq!(read_exactly(&mut first, 5).await, b"first");
    assert_eq!(read_exactly(&mut second, 6).await, b"second");

    wait_for_condition(
        || async { amf.connections() == 2 },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .unwrap();

    running.stop(Duration::from_secs(1)).await.unwrap();
}

/// With no AMF listening the connection falls back to the mock AMF
#[tokio::test]
async fn test_unreachable_amf_falls_back_to_mock() {
    init_test_logging();
    // Bind then drop to get a port nobody listens on
    let dead = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let running = RunningBridge::start_with_transport(
        bridge_config(dead),
        Arc::new(LoopbackTransport::new()),
    )
    .await
    .unwrap();

    assert_eq!(running.bridge.announce_mode().await, BridgeMode::Mock);

    let mut gnb = TcpStream::connect(running.addr).await.unwrap();
    gnb.write_all(&setup_request()).await.unwrap();
    let reply =
        integration_tests::read_reply(&mut gnb, DEFAULT_TEST_TIMEOUT).await.unwrap();
    assert_eq!(reply, ngbridge_ngap::build_setup_success().as_bytes());

    running.stop(Duration::from_secs(1)).await.unwrap();
}

/// An unsupported transport is never fatal
#[tokio::test]
async fn test_unsupported_transport_runs_mock() {
    init_test_logging();
    let running = RunningBridge::start_with_transport(
        bridge_config("127.0.0.1:1".parse().unwrap()),
        Arc::new(UnavailableTransport::new("no SCTP in this sandbox")),
    )
    .await
    .unwrap();

    let mut gnb = TcpStream::connect(running.addr).await.unwrap();
    gnb.write_all(&garbage_message()).await.unwrap();
    let reply =
        integration_tests::read_reply(&mut gnb, DEFAULT_TEST_TIMEOUT).await.unwrap();
    assert_eq!(reply[0], ngbridge_ngap::PduType::UnsuccessfulOutcome as u8);

    running.stop(Duration::from_secs(1)).await.unwrap();
}

/// With the AMF down, the default transport fails fast: the gNB is answered
/// well within the default probe timeout.
#[tokio::test]
async fn test_amf_down_answers_without_probe_delay() {
    init_test_logging();
    let dead = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let config = BridgeConfig {
        probe_timeout_ms: BridgeConfig::default().probe_timeout_ms,
        ..bridge_config(dead)
    };
    assert_eq!(config.amf_transport, AmfTransport::Kernel);

    let started = Instant::now();
    assert_eq!(
        AmfBridge::new(config.clone()).announce_mode().await,
        BridgeMode::Mock
    );
    assert!(started.elapsed() < Duration::from_secs(1));

    let running = RunningBridge::start(config).await.unwrap();
    let mut gnb = TcpStream::connect(running.addr).await.unwrap();

    let started = Instant::now();
    gnb.write_all(&setup_request()).await.unwrap();
    let reply =
        integration_tests::read_reply(&mut gnb, DEFAULT_TEST_TIMEOUT).await.unwrap();
    assert_eq!(reply, ngbridge_ngap::build_setup_success().as_bytes());
    assert!(started.elapsed() < Duration::from_secs(1));

    running.stop(Duration::from_secs(1)).await.unwrap();
}

/// The SCTP-over-UDP transport relays to an sctp-proto AMF
#[tokio::test]
async fn test_bridge_over_udp_sctp_round_trip() {
    init_test_logging();
    let amf = UdpSctpEchoAmf::start().await.unwrap();
    let config = BridgeConfig {
        amf_transport: AmfTransport::Udp,
        probe_timeout_ms: 2000,
        ..bridge_config(amf.addr())
    };
    let running = RunningBridge::start(config).await.unwrap();

    let mut gnb = TcpStream::connect(running.addr).await.unwrap();
    let request = setup_request();
    gnb.write_all(&request).await.unwrap();
    assert_eq!(read_exactly(&mut gnb, request.len()).await, request);

    let garbage = garbage_message();
    gnb.write_all(&garbage).await.unwrap();
    assert_eq!(read_exactly(&mut gnb, garbage.len()).await, garbage);

    assert_eq!(amf.associations(), 1);
    running.stop(Duration::from_secs(1)).await.unwrap();
}

/// The default kernel SCTP transport relays to a kernel SCTP AMF
#[cfg(unix)]
#[tokio::test]
async fn test_bridge_over_kernel_sctp_round_trip() {
    init_test_logging();
    let amf = match integration_tests::KernelSctpEchoAmf::start().await {
        Ok(amf) => amf,
        Err(e) => {
            eprintln!("kernel SCTP unavailable ({e}), skipping");
            return;
        }
    };
    let running = RunningBridge::start(BridgeConfig {
        probe_timeout_ms: 2000,
        ..bridge_config(amf.addr())
    })
    .await
    .unwrap();

    assert_eq!(running.bridge.announce_mode().await, BridgeMode::Bridge);

    let mut gnb = TcpStream::connect(running.addr).await.unwrap();
    let request = setup_request();
    gnb.write_all(&request).await.unwrap();
    assert_eq!(read_exactly(&mut gnb, request.len()).await, request);

    wait_for_condition(
        || async { amf.associations() == 2 },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .unwrap();

    running.stop(Duration::from_secs(1)).await.unwrap();
}
