//! Test fixtures and configuration helpers
//!
//! Bridge configurations with short timeouts, sample gNB messages, and a
//! bridge running on an ephemeral port.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;

use ngbridge_amf::{AmfBridge, BridgeError, SecondaryTransport};
use ngbridge_common::BridgeConfig;
use ngbridge_ngap::SETUP_REQUEST_TAG;

use crate::test_utils::TestResult;

/// Address every test listener binds to
pub const TEST_LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Mock-only bridge on an ephemeral port with timeouts in the 100 ms range
pub fn mock_config() -> BridgeConfig {
    BridgeConfig {
        tcp_addr: TEST_LOCALHOST,
        tcp_port: 0,
        accept_poll_ms: 100,
        forward_poll_ms: 100,
        mock_recv_timeout_ms: 200,
        probe_timeout_ms: 200,
        mock_only: true,
        ..Default::default()
    }
}

/// Bridge configuration pointing at `amf`
pub fn bridge_config(amf: SocketAddr) -> BridgeConfig {
    BridgeConfig {
        sctp_addr: amf.ip(),
        sctp_port: amf.port(),
        mock_only: false,
        ..mock_config()
    }
}

/// A minimal NG Setup Request: the setup tag plus a short payload
pub fn setup_request() -> Vec<u8> {
    let mut msg = SETUP_REQUEST_TAG.to_vec();
    msg.extend_from_slice(&[0x00, 0x03, 0x00, 0x00, 0x01]);
    msg
}

/// Two bytes that are not NGAP
pub fn garbage_message() -> Vec<u8> {
    vec![0xde, 0xad]
}

/// A bridge accepting connections in a background task
pub struct RunningBridge {
    pub bridge: AmfBridge,
    pub addr: SocketAddr,
    runner: JoinHandle<Result<(), BridgeError>>,
}

impl RunningBridge {
    /// Binds and runs a bridge using the transport `config` selects
    pub async fn start(config: BridgeConfig) -> TestResult<Self> {
        Self::launch(AmfBridge::new(config)).await
    }

    /// Binds and runs a bridge with an explicit AMF transport
    pub async fn start_with_transport(
        config: BridgeConfig,
        transport: Arc<dyn SecondaryTransport>,
    ) -> TestResult<Self> {
        Self::launch(AmfBridge::with_transport(config, transport)).await
    }

    async fn launch(bridge: AmfBridge) -> TestResult<Self> {
        let listener = bridge.bind().await?;
        let addr = listener.local_addr()?;
        let runner = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.run(listener).await })
        };
        Ok(Self {
            bridge,
            addr,
            runner,
        })
    }

    /// Stops the bridge and waits for the accept loop, bounded by `within`.
    ///
    /// Returns the number of connections that were still live.
    pub async fn stop(self, within: Duration) -> TestResult<usize> {
        let closed = self.bridge.stop();
        timeout(within, self.runner)
            .await
            .map_err(|_| "accept loop did not stop in time")???;
        Ok(closed)
    }
}
