//! Acceptor and connection lifecycle
//!
//! [`AmfBridge`] binds the TCP listener, accepts gNB connections and gives
//! each one its own task. The task probes the AMF transport, then either
//! relays to the AMF (BRIDGE) or answers locally (MOCK), and finally tears
//! the connection down. [`AmfBridge::stop`] ends the accept loop and closes
//! every live connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ngbridge_common::{AmfTransport, BridgeConfig};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{BridgeError, Result};
use crate::forwarder::forward;
use crate::mock::{run_mock, MockOptions};
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::session::{BridgeMode, Session};
use crate::transport::{
    probe_secondary_transport, SctpTransport, SecondaryTransport, UdpSctpTransport,
    UnavailableTransport,
};

/// Process-wide "keep running" flag shared by every loop
#[derive(Debug, Clone)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    /// A flag that starts out running
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// The NGAP bridge. Clones share the same registry, transport and flag.
#[derive(Clone)]
pub struct AmfBridge {
    config: Arc<BridgeConfig>,
    registry: Arc<ConnectionRegistry>,
    transport: Arc<dyn SecondaryTransport>,
    running: RunningFlag,
}

impl AmfBridge {
    /// Bridge using the transport the configuration asks for: none with
    /// `mock_only`, otherwise kernel SCTP or SCTP over UDP per
    /// `amf_transport`.
    pub fn new(config: BridgeConfig) -> Self {
        let transport: Arc<dyn SecondaryTransport> = if config.mock_only {
            Arc::new(UnavailableTransport::new("mock-only mode"))
        } else {
            match config.amf_transport {
                AmfTransport::Kernel => Arc::new(SctpTransport::new(config.probe_timeout())),
                AmfTransport::Udp => Arc::new(UdpSctpTransport::new(config.probe_timeout())),
            }
        };
        Self::with_transport(config, transport)
    }

    /// Bridge with an explicit AMF transport
    pub fn with_transport(config: BridgeConfig, transport: Arc<dyn SecondaryTransport>) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(ConnectionRegistry::new()),
            transport,
            running: RunningFlag::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn running(&self) -> &RunningFlag {
        &self.running
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    /// Binds the TCP listener. Failure here is fatal.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.tcp_endpoint();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BridgeError::Bind { addr, source })?;
        let local = listener.local_addr().unwrap_or(addr);
        info!("Listening for gNB connections on {}", local);
        Ok(listener)
    }

    /// Probes the AMF once to report the mode new connections will most
    /// likely use. Connections still probe individually.
    pub async fn announce_mode(&self) -> BridgeMode {
        let amf = self.config.sctp_endpoint();
        match probe_secondary_transport(self.transport.as_ref(), amf).await {
            Some(mut session) => {
                session.close().await;
                info!("Operating mode: BRIDGE (relaying to AMF {})", amf);
                BridgeMode::Bridge
            }
            None => {
                info!("Operating mode: MOCK (answering NG Setup locally)");
                BridgeMode::Mock
            }
        }
    }

    /// Accepts connections until [`stop`](Self::stop) is called.
    ///
    /// Each accept wait is bounded by `accept_poll`. The listener is closed
    /// on return.
    pub async fn run(&self, listener: TcpListener) -> Result<()> {
        let accept_poll = self.config.accept_poll();

        while self.running.is_running() {
            let accepted = match timeout(accept_poll, listener.accept()).await {
                Err(_) => continue,
                Ok(accepted) => accepted,
            };

            match accepted {
                Ok((stream, peer)) => self.spawn_connection(stream, peer),
                Err(e) => {
                    if self.running.is_running() {
                        error!("Accept failed: {}", e);
                    }
                }
            }
        }

        debug!("Accept loop stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let handle = ConnectionHandle::new(peer);
        if let Err(e) = self.registry.add(handle.clone()) {
            warn!("Rejecting connection from {}: {}", peer, e);
            return;
        }
        info!("Accepted gNB connection from {}", peer);

        let bridge = self.clone();
        tokio::spawn(async move {
            bridge.handle_connection(stream, handle).await;
        });
    }

    async fn handle_connection(&self, mut stream: TcpStream, handle: ConnectionHandle) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("[{}] Failed to set TCP_NODELAY: {}", handle.id(), e);
        }

        let amf = self.config.sctp_endpoint();
        // A stop during the probe must not wait for the probe's own bound
        let secondary = tokio::select! {
            secondary = probe_secondary_transport(self.transport.as_ref(), amf) => Some(secondary),
            _ = handle.closed() => None,
        };

        let result = match secondary {
            None => {
                debug!("[{}] Closed while probing the AMF", handle.id());
                Ok(())
            }
            Some(Some(mut secondary)) => {
                info!("[{}] BRIDGE mode: relaying to AMF {}", handle.id(), amf);
                let mut session = Session::new(BridgeMode::Bridge);
                session.begin();
                session.mark_bridged();
                let result = forward(
                    &mut stream,
                    secondary.as_mut(),
                    &handle,
                    &self.running,
                    self.config.forward_poll(),
                    self.config.buffer_size,
                )
                .await
                .map(|stats| {
                    debug!(
                        "[{}] Forwarded {}/{} bytes",
                        handle.id(),
                        stats.inbound_to_secondary,
                        stats.secondary_to_inbound
                    );
                });
                session.close();
                result
            }
            Some(None) => {
                info!("[{}] MOCK mode: answering NG Setup locally", handle.id());
                let mut session = Session::new(BridgeMode::Mock);
                let options = MockOptions {
                    recv_timeout: self.config.mock_recv_timeout(),
                    idle_timeout: self.config.idle_timeout(),
                    buffer_size: self.config.buffer_size,
                };
                let result = run_mock(&mut stream, &mut session, &handle, &self.running, &options)
                    .await
                    .map(|exit| debug!("[{}] Mock session ended: {:?}", handle.id(), exit));
                session.close();
                result
            }
        };

        if let Err(e) = result {
            error!("[{}] Connection error: {}", handle.id(), e);
        }

        self.registry.remove(handle.id());
        handle.close();
        if let Err(e) = stream.shutdown().await {
            debug!("[{}] Shutdown of gNB stream failed: {}", handle.id(), e);
        }
        info!(
            "[{}] Connection closed after {:.1}s",
            handle.id(),
            handle.age().as_secs_f64()
        );
    }

    /// Stops accepting and closes every live connection.
    ///
    /// Returns the number of connections that were closed.
    pub fn stop(&self) -> usize {
        self.running.stop();
        let closed = self.registry.close_all();
        info!("Bridge stopping, closed {} connection(s)", closed);
        closed
    }
}
