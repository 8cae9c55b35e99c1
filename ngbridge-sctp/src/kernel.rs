//! Kernel SCTP client
//!
//! A one-to-one (`SOCK_STREAM`) SCTP socket from the host stack, the kind
//! Open5GS and other stock AMFs listen on. Requires the `sctp` kernel module;
//! without it socket creation fails with `EPROTONOSUPPORT`, which
//! [`SctpError::is_unsupported`] recognises.
//!
//! Each `send` goes out as one SCTP message and each `recv` returns at most
//! one. Messages carry the stack's default PPID (0); per-message PPIDs need
//! `sctp_sendmsg` ancillary data, which this client does not use.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Result, SctpError};

/// Receive buffer; one NGAP message always fits
const RECV_BUFFER_SIZE: usize = 65536;

/// A connected kernel SCTP association
pub struct KernelSctpStream {
    // tokio has no SCTP type; the one-to-one socket speaks the same
    // read/write/shutdown API as a TCP stream.
    stream: TcpStream,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    rx_buf: Vec<u8>,
}

impl KernelSctpStream {
    /// Connects to `remote`, bounded by `connect_timeout`.
    ///
    /// A refused association (no SCTP listener) fails at once with
    /// `ECONNREFUSED`; a host without kernel SCTP fails at socket creation.
    pub async fn connect(remote: SocketAddr, connect_timeout: Duration) -> Result<Self> {
        debug!("Connecting to kernel SCTP endpoint at {}", remote);

        let socket = Socket::new(
            Domain::for_address(remote),
            Type::STREAM,
            Some(Protocol::from(libc::IPPROTO_SCTP)),
        )?;
        socket.set_nonblocking(true)?;

        // EINPROGRESS is expected for non-blocking sockets
        match socket.connect(&remote.into()) {
            Ok(()) => {}
            Err(ref e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
            Err(e) => return Err(SctpError::Io(e)),
        }

        let std_stream: std::net::TcpStream = socket.into();
        let stream = TcpStream::from_std(std_stream)?;

        let connected = timeout(connect_timeout, async {
            stream.writable().await?;
            match stream.take_error()? {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
        .await;

        match connected {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(SctpError::Io(e)),
            Err(_) => {
                return Err(SctpError::Timeout(format!(
                    "no association with {} within {:?}",
                    remote, connect_timeout
                )))
            }
        }

        let local_addr = stream.local_addr()?;
        info!("Kernel SCTP association {} -> {} established", local_addr, remote);

        Ok(Self {
            stream,
            remote_addr: remote,
            local_addr,
            rx_buf: vec![0u8; RECV_BUFFER_SIZE],
        })
    }

    /// Sends one message
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        Ok(())
    }

    /// Next message; `Ok(None)` once the peer has shut the association down.
    ///
    /// Cancel-safe.
    pub async fn recv(&mut self) -> Result<Option<Bytes>> {
        let n = self.stream.read(&mut self.rx_buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(Bytes::copy_from_slice(&self.rx_buf[..n])))
    }

    /// Graceful SHUTDOWN of the association
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        debug!("Kernel SCTP association with {} shut down", self.remote_addr);
        Ok(())
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
