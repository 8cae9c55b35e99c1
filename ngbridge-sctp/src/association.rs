//! SCTP client association over UDP, driven by `sctp-proto`.

use bytes::Bytes;
use sctp_proto::{
    Association, AssociationHandle, ClientConfig, DatagramEvent, Endpoint, EndpointConfig, Event,
    Payload, PayloadProtocolIdentifier, TransportConfig, Transmit,
};
use std::{
    collections::{BTreeSet, VecDeque},
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{net::UdpSocket, time::timeout};
use tracing::{debug, info, trace, warn};

use crate::error::{Result, SctpError};
use crate::NGAP_PPID;

/// Default number of SCTP streams for NGAP
pub const DEFAULT_NUM_STREAMS: u16 = 2;
/// Default maximum message size (64KB)
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 65536;
/// Default receive buffer size (256KB)
pub const DEFAULT_RECEIVE_BUFFER_SIZE: u32 = 262144;

/// Granularity of the handshake and shutdown loops
const HANDSHAKE_POLL: Duration = Duration::from_millis(100);
/// Bound on a graceful shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// Largest UDP datagram we expect to receive
const MAX_DATAGRAM: usize = 65536;

/// SCTP association state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    Closed,
    Connecting,
    Established,
    ShuttingDown,
}

/// Configuration for SCTP association
#[derive(Debug, Clone)]
pub struct SctpConfig {
    pub max_outbound_streams: u16,
    pub max_inbound_streams: u16,
    pub max_message_size: u32,
    pub max_receive_buffer_size: u32,
    pub connect_timeout: Duration,
    pub rto_initial_ms: u64,
    pub rto_min_ms: u64,
    pub rto_max_ms: u64,
}

impl Default for SctpConfig {
    fn default() -> Self {
        Self {
            max_outbound_streams: DEFAULT_NUM_STREAMS,
            max_inbound_streams: DEFAULT_NUM_STREAMS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            connect_timeout: Duration::from_secs(30),
            rto_initial_ms: 3000,
            rto_min_ms: 1000,
            rto_max_ms: 60000,
        }
    }
}

impl SctpConfig {
    /// Same configuration with a different handshake bound
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// One SCTP association to a remote endpoint, driven over a UDP socket.
///
/// Received user messages are queued in an inbox, so a [`recv`] future that
/// is dropped before completing loses nothing: the next call picks up where
/// the previous one stopped.
///
/// [`recv`]: SctpAssociation::recv
pub struct SctpAssociation {
    socket: UdpSocket,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    endpoint: Endpoint,
    handle: AssociationHandle,
    association: Association,
    state: AssociationState,
    pending_transmits: VecDeque<Transmit>,
    /// Every stream in use, opened by either side; all are read from
    streams: BTreeSet<u16>,
    inbox: VecDeque<Bytes>,
    rx_buf: Vec<u8>,
    config: SctpConfig,
}

impl SctpAssociation {
    /// Connect to a remote SCTP endpoint (AMF)
    pub async fn connect(remote_addr: SocketAddr, config: SctpConfig) -> Result<Self> {
        let local_addr = if remote_addr.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };
        Self::connect_with_local(local_addr, remote_addr, config).await
    }

    /// Connect to a remote SCTP endpoint from a specific local address
    pub async fn connect_with_local(
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        config: SctpConfig,
    ) -> Result<Self> {
        debug!("Connecting to SCTP endpoint at {}", remote_addr);

        let socket = UdpSocket::bind(local_addr).await?;
        let actual_local = socket.local_addr()?;
        trace!("Bound to local address: {}", actual_local);

        let mut endpoint = Endpoint::new(Arc::new(EndpointConfig::new()), None);

        let transport_config = TransportConfig::default()
            .with_max_num_outbound_streams(config.max_outbound_streams)
            .with_max_num_inbound_streams(config.max_inbound_streams)
            .with_max_message_size(config.max_message_size)
            .with_max_receive_buffer_size(config.max_receive_buffer_size)
            .with_rto_initial_ms(config.rto_initial_ms)
            .with_rto_min_ms(config.rto_min_ms)
            .with_rto_max_ms(config.rto_max_ms);

        let mut client_config = ClientConfig::new();
        client_config.transport = Arc::new(transport_config);

        let (handle, association) = endpoint
            .connect(client_config, remote_addr)
            .map_err(|e| SctpError::ConnectionFailed(e.to_string()))?;

        let mut assoc = Self {
            socket,
            remote_addr,
            local_addr: actual_local,
            endpoint,
            handle,
            association,
            state: AssociationState::Connecting,
            pending_transmits: VecDeque::new(),
            streams: BTreeSet::new(),
            inbox: VecDeque::new(),
            rx_buf: vec![0u8; MAX_DATAGRAM],
            config,
        };

        assoc.perform_handshake().await?;
        Ok(assoc)
    }

    /// INIT / INIT-ACK / COOKIE-ECHO / COOKIE-ACK, bounded by `connect_timeout`
    async fn perform_handshake(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.connect_timeout;

        loop {
            self.drive();
            self.flush_transmits().await?;

            if self.state == AssociationState::Closed {
                return Err(SctpError::ConnectionFailed(format!(
                    "association to {} lost during handshake",
                    self.remote_addr
                )));
            }
            if !self.association.is_handshaking() {
                self.state = AssociationState::Established;
                info!("SCTP association established with {}", self.remote_addr);
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SctpError::Timeout(format!(
                    "no handshake with {} within {:?}",
                    self.remote_addr, self.config.connect_timeout
                )));
            }

            let wait = HANDSHAKE_POLL.min(deadline - now);
            match timeout(wait, self.socket.recv_from(&mut self.rx_buf)).await {
                Ok(Ok((len, from))) => self.handle_datagram(from, len),
                // ICMP port unreachable surfaces here on some platforms
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    return Err(SctpError::ConnectionFailed(e.to_string()));
                }
                Ok(Err(e)) => return Err(SctpError::Io(e)),
                Err(_) => trace!("Handshake receive timeout, retrying"),
            }
        }
    }

    /// Feeds one received datagram into the endpoint
    fn handle_datagram(&mut self, from: SocketAddr, len: usize) {
        trace!("Received {} bytes from {}", len, from);
        let data = Bytes::copy_from_slice(&self.rx_buf[..len]);

        if let Some((handle, event)) = self.endpoint.handle(Instant::now(), from, None, None, data)
        {
            if handle != self.handle {
                return;
            }
            match event {
                DatagramEvent::AssociationEvent(assoc_event) => {
                    self.association.handle_event(assoc_event);
                }
                DatagramEvent::NewAssociation(_) => {
                    debug!("Ignoring new association event (client mode)");
                }
            }
        }
    }

    /// Runs the protocol state machine without doing I/O: events, timers,
    /// received stream data and outgoing transmits.
    fn drive(&mut self) {
        while let Some(event) = self.association.poll() {
            match event {
                Event::Connected => {
                    if self.state == AssociationState::Connecting {
                        self.state = AssociationState::Established;
                    }
                }
                Event::AssociationLost { reason, .. } => {
                    warn!("SCTP association with {} lost: {}", self.remote_addr, reason);
                    self.state = AssociationState::Closed;
                }
                Event::Stream(stream_event) => trace!("Stream event: {:?}", stream_event),
                Event::DatagramReceived => trace!("Datagram received event"),
                _ => {}
            }
        }

        self.collect_messages();

        let now = Instant::now();
        if let Some(deadline) = self.association.poll_timeout() {
            if now >= deadline {
                self.association.handle_timeout(now);
            }
        }

        while let Some(transmit) = self.association.poll_transmit(now) {
            self.pending_transmits.push_back(transmit);
        }
        while let Some(transmit) = self.endpoint.poll_transmit() {
            self.pending_transmits.push_back(transmit);
        }
    }

    /// Moves every complete user message from the association into the inbox
    fn collect_messages(&mut self) {
        while let Some(stream) = self.association.accept_stream() {
            let stream_id = stream.stream_identifier();
            debug!("Accepted stream {} from {}", stream_id, self.remote_addr);
            self.streams.insert(stream_id);
        }

        let Self {
            association,
            streams,
            inbox,
            ..
        } = self;

        for &stream_id in streams.iter() {
            let Ok(mut stream) = association.stream(stream_id) else {
                continue;
            };
            while let Ok(Some(mut chunks)) = stream.read() {
                let mut buf = vec![0u8; chunks.len()];
                match chunks.read(&mut buf) {
                    Ok(n) if n > 0 => {
                        buf.truncate(n);
                        trace!("Received {} bytes on stream {}", n, stream_id);
                        inbox.push_back(Bytes::from(buf));
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to read chunks on stream {}: {}", stream_id, e),
                }
            }
        }
    }

    /// Writes pending transmits; a transmit leaves the queue only once sent
    async fn flush_transmits(&mut self) -> Result<()> {
        while let Some(transmit) = self.pending_transmits.front() {
            if let Payload::RawEncode(chunks) = &transmit.payload {
                for chunk in chunks {
                    self.socket.send_to(chunk, transmit.remote).await?;
                    trace!("Sent {} bytes to {}", chunk.len(), transmit.remote);
                }
            }
            self.pending_transmits.pop_front();
        }
        Ok(())
    }

    /// Send data on a stream with the NGAP PPID
    pub async fn send(&mut self, stream_id: u16, data: &[u8]) -> Result<()> {
        self.send_with_ppid(stream_id, data, NGAP_PPID).await
    }

    /// Send data on a stream with a custom PPID
    pub async fn send_with_ppid(&mut self, stream_id: u16, data: &[u8], ppid: u32) -> Result<()> {
        if self.state != AssociationState::Established {
            return Err(SctpError::InvalidState(format!(
                "cannot send in state {:?}",
                self.state
            )));
        }

        let ppi = PayloadProtocolIdentifier::from(ppid);

        if !self.streams.contains(&stream_id) {
            self.association
                .open_stream(stream_id, ppi)
                .map_err(|e| SctpError::StreamError(e.to_string()))?;
            self.streams.insert(stream_id);
        }

        self.association
            .stream(stream_id)
            .and_then(|mut stream| stream.write_with_ppi(data, ppi))
            .map_err(|e| SctpError::StreamError(e.to_string()))?;

        trace!("Queued {} bytes on stream {} with PPID {}", data.len(), stream_id, ppid);

        self.drive();
        self.flush_transmits().await
    }

    /// Receive the next user message from any stream.
    ///
    /// Returns `Ok(None)` once the association is closed. Cancel-safe.
    pub async fn recv(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(msg) = self.inbox.pop_front() {
                return Ok(Some(msg));
            }
            if self.state == AssociationState::Closed {
                return Ok(None);
            }

            self.flush_transmits().await?;

            let received = match self.association.poll_timeout() {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    timeout(wait, self.socket.recv_from(&mut self.rx_buf)).await.ok()
                }
                None => Some(self.socket.recv_from(&mut self.rx_buf).await),
            };

            if let Some(result) = received {
                let (len, from) = result?;
                self.handle_datagram(from, len);
            }
            self.drive();
        }
    }

    /// Take a queued message without waiting
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.drive();
        self.inbox.pop_front()
    }

    /// Initiate graceful shutdown (SHUTDOWN / SHUTDOWN-ACK), bounded to 5s
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state == AssociationState::Closed {
            return Ok(());
        }

        debug!("Shutting down SCTP association with {}", self.remote_addr);
        self.state = AssociationState::ShuttingDown;

        if let Err(e) = self.association.shutdown() {
            debug!("SCTP shutdown request rejected: {}", e);
        }
        self.drive();
        self.flush_transmits().await?;

        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        while !self.association.is_closed() && Instant::now() < deadline {
            if let Ok(Ok((len, from))) =
                timeout(HANDSHAKE_POLL, self.socket.recv_from(&mut self.rx_buf)).await
            {
                self.handle_datagram(from, len);
            }
            self.drive();
            self.flush_transmits().await?;
        }

        self.state = AssociationState::Closed;
        info!("SCTP association with {} shut down", self.remote_addr);
        Ok(())
    }

    /// Close the association immediately (ABORT)
    pub fn close(&mut self) {
        if self.state != AssociationState::Closed {
            if let Err(e) = self.association.close() {
                debug!("SCTP close failed: {}", e);
            }
            self.state = AssociationState::Closed;
        }
    }

    /// Check if the association is established
    pub fn is_established(&self) -> bool {
        self.state == AssociationState::Established
    }

    /// Check if the association is closed
    pub fn is_closed(&self) -> bool {
        self.state == AssociationState::Closed
    }

    /// Get the current state
    pub fn state(&self) -> AssociationState {
        self.state
    }

    /// Get the remote address
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Get the local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the current RTT estimate
    pub fn rtt(&self) -> Duration {
        self.association.rtt()
    }
}

impl Drop for SctpAssociation {
    fn drop(&mut self) {
        self.close();
    }
}
