//! Secondary transport towards the real AMF
//!
//! The bridge asks a [`SecondaryTransport`] for a session to the AMF once per
//! accepted connection. The answer decides the connection's mode: a live
//! session means BRIDGE, anything else means MOCK.
//!
//! "Not available on this host" ([`Probe::Unsupported`]) and "the AMF did not
//! answer" ([`Probe::Unreachable`]) are kept apart so the logs say which one
//! happened.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{info, warn};

pub mod sctp;
pub mod udp;

pub use sctp::SctpTransport;
pub use udp::UdpSctpTransport;

/// Outcome of one probe
pub enum Probe {
    /// Live session to the AMF
    Connected(Box<dyn SecondarySession>),
    /// The transport cannot be used on this host
    Unsupported(String),
    /// The transport works but the AMF did not answer
    Unreachable(String),
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Probe::Connected(_) => f.write_str("Connected"),
            Probe::Unsupported(reason) => f.debug_tuple("Unsupported").field(reason).finish(),
            Probe::Unreachable(reason) => f.debug_tuple("Unreachable").field(reason).finish(),
        }
    }
}

/// A way of reaching the AMF
#[async_trait]
pub trait SecondaryTransport: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Tries to open a session to `remote`. Must not block past its own bound.
    async fn probe(&self, remote: SocketAddr) -> Probe;
}

/// A live, message-oriented session to the AMF
#[async_trait]
pub trait SecondarySession: Send {
    /// Sends one message unmodified
    async fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Next message from the AMF; `Ok(None)` once the peer has closed.
    ///
    /// Must be cancel-safe: the forwarder races it against the inbound side.
    async fn recv(&mut self) -> io::Result<Option<Bytes>>;

    /// Releases the session. Errors are logged, not returned.
    async fn close(&mut self);
}

/// Transport that never connects; every connection runs in MOCK mode
#[derive(Debug, Clone)]
pub struct UnavailableTransport {
    reason: String,
}

impl UnavailableTransport {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableTransport {
    fn default() -> Self {
        Self::new("AMF transport disabled")
    }
}

#[async_trait]
impl SecondaryTransport for UnavailableTransport {
    fn name(&self) -> &str {
        "none"
    }

    async fn probe(&self, _remote: SocketAddr) -> Probe {
        Probe::Unsupported(self.reason.clone())
    }
}

/// Maps an SCTP error onto the I/O error the forwarder reports
#[cfg(any(feature = "sctp", feature = "sctp-over-udp"))]
pub(crate) fn sctp_error_into_io(e: ngbridge_sctp::SctpError) -> io::Error {
    use ngbridge_sctp::SctpError;

    match e {
        SctpError::Io(e) => e,
        SctpError::AssociationClosed => io::Error::from(io::ErrorKind::ConnectionAborted),
        SctpError::Timeout(msg) => io::Error::new(io::ErrorKind::TimedOut, msg),
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

/// Probes `transport` and logs the outcome.
///
/// Returns the session on success; `None` means the caller falls back to
/// MOCK mode.
pub async fn probe_secondary_transport(
    transport: &dyn SecondaryTransport,
    remote: SocketAddr,
) -> Option<Box<dyn SecondarySession>> {
    match transport.probe(remote).await {
        Probe::Connected(session) => {
            info!("{} session to AMF {} established", transport.name(), remote);
            Some(session)
        }
        Probe::Unsupported(reason) => {
            warn!(
                "{} transport unavailable ({}), falling back to mock AMF",
                transport.name(),
                reason
            );
            None
        }
        Probe::Unreachable(reason) => {
            warn!(
                "AMF {} unreachable over {} ({}), falling back to mock AMF",
                remote,
                transport.name(),
                reason
            );
            None
        }
    }
}
