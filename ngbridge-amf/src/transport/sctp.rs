//! Kernel SCTP transport
//!
//! Each probe opens a fresh one-to-one association from the host SCTP stack,
//! which is what a stock AMF listens on. A refused association fails at once,
//! so an absent AMF costs no more than a round trip. Without the `sctp` cargo
//! feature, or off unix, the transport reports itself unsupported.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;

use super::{Probe, SecondaryTransport};

/// Reaches the AMF over kernel SCTP
#[derive(Debug, Clone)]
pub struct SctpTransport {
    probe_timeout: Duration,
}

impl SctpTransport {
    /// Transport whose association setup is bounded by `probe_timeout`
    pub fn new(probe_timeout: Duration) -> Self {
        Self { probe_timeout }
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }
}

#[cfg(all(feature = "sctp", unix))]
#[async_trait]
impl SecondaryTransport for SctpTransport {
    fn name(&self) -> &str {
        "SCTP"
    }

    async fn probe(&self, remote: SocketAddr) -> Probe {
        use ngbridge_sctp::KernelSctpStream;

        match KernelSctpStream::connect(remote, self.probe_timeout).await {
            Ok(stream) => Probe::Connected(Box::new(session::KernelSctpSession::new(stream))),
            Err(e) if e.is_unsupported() => Probe::Unsupported(e.to_string()),
            Err(e) => Probe::Unreachable(e.to_string()),
        }
    }
}

#[cfg(not(all(feature = "sctp", unix)))]
#[async_trait]
impl SecondaryTransport for SctpTransport {
    fn name(&self) -> &str {
        "SCTP"
    }

    async fn probe(&self, _remote: SocketAddr) -> Probe {
        Probe::Unsupported("built without kernel SCTP support".into())
    }
}

#[cfg(all(feature = "sctp", unix))]
mod session {
    use std::io;

    use async_trait::async_trait;
    use bytes::Bytes;
    use ngbridge_sctp::KernelSctpStream;
    use tracing::debug;

    use crate::transport::{sctp_error_into_io, SecondarySession};

    /// One kernel SCTP association used as a bridge session
    pub(super) struct KernelSctpSession {
        stream: KernelSctpStream,
    }

    impl KernelSctpSession {
        pub(super) fn new(stream: KernelSctpStream) -> Self {
            Self { stream }
        }
    }

    #[async_trait]
    impl SecondarySession for KernelSctpSession {
        async fn send(&mut self, data: &[u8]) -> io::Result<()> {
            self.stream.send(data).await.map_err(sctp_error_into_io)
        }

        async fn recv(&mut self) -> io::Result<Option<Bytes>> {
            self.stream.recv().await.map_err(sctp_error_into_io)
        }

        async fn close(&mut self) {
            if let Err(e) = self.stream.shutdown().await {
                debug!("SCTP shutdown towards {} failed: {}", self.stream.remote_addr(), e);
            }
        }
    }
}
