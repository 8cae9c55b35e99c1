//! SCTP-over-UDP transport
//!
//! Each probe opens a fresh `sctp-proto` association over UDP. Only AMFs
//! built on `sctp-proto` understand it; a kernel SCTP listener never answers,
//! so against one every probe runs into `probe_timeout`. Opt in with the
//! `sctp-over-udp` cargo feature and `amf_transport: udp`.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;

use super::{Probe, SecondaryTransport};

/// Stream NGAP non-UE-associated signalling uses
#[cfg(feature = "sctp-over-udp")]
const NGAP_STREAM: u16 = 0;

/// Reaches the AMF over `sctp-proto` SCTP encapsulated in UDP
#[derive(Debug, Clone)]
pub struct UdpSctpTransport {
    probe_timeout: Duration,
}

impl UdpSctpTransport {
    /// Transport whose handshake is bounded by `probe_timeout`
    pub fn new(probe_timeout: Duration) -> Self {
        Self { probe_timeout }
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }
}

#[cfg(feature = "sctp-over-udp")]
#[async_trait]
impl SecondaryTransport for UdpSctpTransport {
    fn name(&self) -> &str {
        "SCTP/UDP"
    }

    async fn probe(&self, remote: SocketAddr) -> Probe {
        use ngbridge_sctp::{SctpAssociation, SctpConfig};

        let config = SctpConfig::default().with_connect_timeout(self.probe_timeout);
        // The outer bound also covers socket setup
        let attempt = tokio::time::timeout(
            self.probe_timeout + Duration::from_millis(100),
            SctpAssociation::connect(remote, config),
        )
        .await;

        match attempt {
            Ok(Ok(assoc)) => Probe::Connected(Box::new(session::UdpSctpSession::new(assoc))),
            Ok(Err(e)) if e.is_unsupported() => Probe::Unsupported(e.to_string()),
            Ok(Err(e)) => Probe::Unreachable(e.to_string()),
            Err(_) => Probe::Unreachable(format!("no answer within {:?}", self.probe_timeout)),
        }
    }
}

#[cfg(not(feature = "sctp-over-udp"))]
#[async_trait]
impl SecondaryTransport for UdpSctpTransport {
    fn name(&self) -> &str {
        "SCTP/UDP"
    }

    async fn probe(&self, _remote: SocketAddr) -> Probe {
        Probe::Unsupported("built without the sctp-over-udp feature".into())
    }
}

#[cfg(feature = "sctp-over-udp")]
mod session {
    use std::io;

    use async_trait::async_trait;
    use bytes::Bytes;
    use ngbridge_sctp::SctpAssociation;
    use tracing::debug;

    use super::NGAP_STREAM;
    use crate::transport::{sctp_error_into_io, SecondarySession};

    /// One `sctp-proto` association used as a bridge session
    pub(super) struct UdpSctpSession {
        assoc: SctpAssociation,
    }

    impl UdpSctpSession {
        pub(super) fn new(assoc: SctpAssociation) -> Self {
            Self { assoc }
        }
    }

    #[async_trait]
    impl SecondarySession for UdpSctpSession {
        async fn send(&mut self, data: &[u8]) -> io::Result<()> {
            self.assoc.send(NGAP_STREAM, data).await.map_err(sctp_error_into_io)
        }

        async fn recv(&mut self) -> io::Result<Option<Bytes>> {
            self.assoc.recv().await.map_err(sctp_error_into_io)
        }

        async fn close(&mut self) {
            if let Err(e) = self.assoc.shutdown().await {
                debug!("SCTP shutdown towards {} failed: {}", self.assoc.remote_addr(), e);
            }
        }
    }
}
