//! TCP stand-in for the AMF transport
//!
//! [`LoopbackTransport`] implements the bridge's AMF transport over plain
//! TCP, so BRIDGE mode can be exercised without SCTP. [`EchoAmf`] is the
//! matching AMF: it sends every byte it receives straight back.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::debug;

use ngbridge_amf::{Probe, SecondarySession, SecondaryTransport};

/// AMF transport that connects over TCP
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    probes: AtomicUsize,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of probes made so far
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecondaryTransport for LoopbackTransport {
    fn name(&self) -> &str {
        "loopback"
    }

    async fn probe(&self, remote: SocketAddr) -> Probe {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match TcpStream::connect(remote).await {
            Ok(stream) => Probe::Connected(Box::new(LoopbackSession {
                stream,
                buf: vec![0u8; 4096],
            })),
            Err(e) => Probe::Unreachable(e.to_string()),
        }
    }
}

struct LoopbackSession {
    stream: TcpStream,
    buf: Vec<u8>,
}

#[async_trait]
impl SecondarySession for LoopbackSession {
    async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await
    }

    async fn recv(&mut self) -> io::Result<Option<Bytes>> {
        let n = self.stream.read(&mut self.buf).await?;
        Ok((n > 0).then(|| Bytes::copy_from_slice(&self.buf[..n])))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("Loopback session shutdown failed: {}", e);
        }
    }
}

/// AMF that echoes every byte back on each accepted connection
pub struct EchoAmf {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl EchoAmf {
    /// Starts listening on an ephemeral localhost port
    pub async fn start() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        let task = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let (mut rd, mut wr) = stream.split();
                    let _ = tokio::io::copy(&mut rd, &mut wr).await;
                });
            }
        });

        Ok(Self {
            addr,
            connections,
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for EchoAmf {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_session_echoes() {
        let amf = EchoAmf::start().await.unwrap();
        let transport = LoopbackTransport::new();

        let Probe::Connected(mut session) = transport.probe(amf.addr()).await else {
            panic!("loopback probe failed");
        };
        session.send(b"ping").await.unwrap();
        let echoed = session.recv().await.unwrap().unwrap();
        assert_eq!(&echoed[..], b"ping");
        session.close().await;

        assert_eq!(transport.probes(), 1);
        assert_eq!(amf.connections(), 1);
    }

    #[tokio::test]
    async fn test_loopback_unreachable() {
        // Bind then drop to get a port nobody listens on
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let transport = LoopbackTransport::new();
        assert!(matches!(transport.probe(addr).await, Probe::Unreachable(_)));
    }
}
