//! Bridge configuration
//!
//! [`BridgeConfig`] holds the listener and AMF endpoints plus every timeout
//! the bridge uses. Values are layered: defaults, then an optional YAML file,
//! then `BRIDGE_*` environment variables, then positional command-line
//! arguments.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Environment variable overriding the TCP listen address
pub const ENV_TCP_ADDR: &str = "BRIDGE_TCP_ADDR";
/// Environment variable overriding the TCP listen port
pub const ENV_TCP_PORT: &str = "BRIDGE_TCP_PORT";
/// Environment variable overriding the AMF SCTP address
pub const ENV_SCTP_ADDR: &str = "BRIDGE_SCTP_ADDR";
/// Environment variable overriding the AMF SCTP port
pub const ENV_SCTP_PORT: &str = "BRIDGE_SCTP_PORT";
/// Environment variable selecting the AMF transport (`kernel` or `udp`)
pub const ENV_AMF_TRANSPORT: &str = "BRIDGE_AMF_TRANSPORT";

/// Default TCP listen address
pub const DEFAULT_TCP_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 4));
/// Default TCP listen port (the NGAP port)
pub const DEFAULT_TCP_PORT: u16 = 38412;
/// Default AMF SCTP address
pub const DEFAULT_SCTP_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 5));
/// Default AMF SCTP port
pub const DEFAULT_SCTP_PORT: u16 = 38413;
/// Default read buffer size for one relay step
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// How the bridge reaches the AMF
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmfTransport {
    /// Kernel SCTP socket, as used by Open5GS and other stock AMFs
    #[default]
    Kernel,
    /// SCTP encapsulated in UDP via `sctp-proto`, for `sctp-proto` peers
    Udp,
}

impl fmt::Display for AmfTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfTransport::Kernel => write!(f, "kernel"),
            AmfTransport::Udp => write!(f, "udp"),
        }
    }
}

impl FromStr for AmfTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kernel" => Ok(AmfTransport::Kernel),
            "udp" => Ok(AmfTransport::Udp),
            _ => Err(format!("unknown AMF transport: {s}")),
        }
    }
}

fn default_tcp_addr() -> IpAddr {
    DEFAULT_TCP_ADDR
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_sctp_addr() -> IpAddr {
    DEFAULT_SCTP_ADDR
}

fn default_sctp_port() -> u16 {
    DEFAULT_SCTP_PORT
}

fn default_accept_poll_ms() -> u64 {
    1000
}

fn default_forward_poll_ms() -> u64 {
    1000
}

fn default_mock_recv_timeout_ms() -> u64 {
    5000
}

fn default_probe_timeout_ms() -> u64 {
    3000
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

/// NGAP bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Address the TCP listener binds to
    #[serde(default = "default_tcp_addr")]
    pub tcp_addr: IpAddr,
    /// Port the TCP listener binds to
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    /// Address of the real AMF
    #[serde(default = "default_sctp_addr")]
    pub sctp_addr: IpAddr,
    /// SCTP port of the real AMF
    #[serde(default = "default_sctp_port")]
    pub sctp_port: u16,
    /// Transport used to reach the AMF
    #[serde(default)]
    pub amf_transport: AmfTransport,
    /// Bound on one accept wait, so shutdown is noticed
    #[serde(default = "default_accept_poll_ms")]
    pub accept_poll_ms: u64,
    /// Bound on one readiness wait in the forwarder
    #[serde(default = "default_forward_poll_ms")]
    pub forward_poll_ms: u64,
    /// Receive timeout in mock mode; a liveness probe may follow it
    #[serde(default = "default_mock_recv_timeout_ms")]
    pub mock_recv_timeout_ms: u64,
    /// Bound on the SCTP handshake when probing the AMF
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Close a mock session after this long without inbound data
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
    /// Read buffer size for one relay step
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Never probe the AMF; every connection runs in mock mode
    #[serde(default)]
    pub mock_only: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tcp_addr: DEFAULT_TCP_ADDR,
            tcp_port: DEFAULT_TCP_PORT,
            sctp_addr: DEFAULT_SCTP_ADDR,
            sctp_port: DEFAULT_SCTP_PORT,
            amf_transport: AmfTransport::Kernel,
            accept_poll_ms: default_accept_poll_ms(),
            forward_poll_ms: default_forward_poll_ms(),
            mock_recv_timeout_ms: default_mock_recv_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            idle_timeout_ms: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            mock_only: false,
        }
    }
}

/// Command-line overrides, applied last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    /// TCP listen address
    pub tcp_addr: Option<IpAddr>,
    /// TCP listen port
    pub tcp_port: Option<u16>,
    /// AMF address
    pub sctp_addr: Option<IpAddr>,
    /// AMF port
    pub sctp_port: Option<u16>,
    /// AMF transport
    pub amf_transport: Option<AmfTransport>,
}

impl BridgeConfig {
    /// Loads a configuration from a YAML file. Missing keys take defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parses a configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Applies the `BRIDGE_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), Error> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Applies `BRIDGE_*` overrides read through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_TCP_ADDR) {
            self.tcp_addr = parse_env(ENV_TCP_ADDR, &value)?;
        }
        if let Some(value) = lookup(ENV_TCP_PORT) {
            self.tcp_port = parse_env(ENV_TCP_PORT, &value)?;
        }
        if let Some(value) = lookup(ENV_SCTP_ADDR) {
            self.sctp_addr = parse_env(ENV_SCTP_ADDR, &value)?;
        }
        if let Some(value) = lookup(ENV_SCTP_PORT) {
            self.sctp_port = parse_env(ENV_SCTP_PORT, &value)?;
        }
        if let Some(value) = lookup(ENV_AMF_TRANSPORT) {
            self.amf_transport = parse_env(ENV_AMF_TRANSPORT, &value)?;
        }
        Ok(())
    }

    /// Applies positional command-line overrides.
    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(addr) = overrides.tcp_addr {
            self.tcp_addr = addr;
        }
        if let Some(port) = overrides.tcp_port {
            self.tcp_port = port;
        }
        if let Some(addr) = overrides.sctp_addr {
            self.sctp_addr = addr;
        }
        if let Some(port) = overrides.sctp_port {
            self.sctp_port = port;
        }
        if let Some(transport) = overrides.amf_transport {
            self.amf_transport = transport;
        }
    }

    /// Checks the values the bridge cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sctp_port == 0 {
            return Err(Error::Config("AMF port must not be 0".into()));
        }
        if self.buffer_size == 0 {
            return Err(Error::Config("buffer_size must be greater than 0".into()));
        }
        for (name, value) in [
            ("accept_poll_ms", self.accept_poll_ms),
            ("forward_poll_ms", self.forward_poll_ms),
            ("mock_recv_timeout_ms", self.mock_recv_timeout_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than 0")));
            }
        }
        if self.idle_timeout_ms == Some(0) {
            return Err(Error::Config("idle_timeout_ms must be greater than 0".into()));
        }
        Ok(())
    }

    /// TCP listen endpoint
    pub fn tcp_endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.tcp_addr, self.tcp_port)
    }

    /// AMF SCTP endpoint
    pub fn sctp_endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.sctp_addr, self.sctp_port)
    }

    /// Accept wait bound
    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }

    /// Forwarder readiness wait bound
    pub fn forward_poll(&self) -> Duration {
        Duration::from_millis(self.forward_poll_ms)
    }

    /// Mock-mode receive timeout
    pub fn mock_recv_timeout(&self) -> Duration {
        Duration::from_millis(self.mock_recv_timeout_ms)
    }

    /// SCTP probe handshake bound
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Idle bound for mock sessions, if any
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    /// Largest wait any loop performs; bounds shutdown latency.
    ///
    /// An AMF probe in flight is abandoned as soon as its connection is
    /// closed, so `probe_timeout` does not count here.
    pub fn shutdown_latency(&self) -> Duration {
        [self.accept_poll(), self.forward_poll(), self.mock_recv_timeout()]
            .into_iter()
            .max()
            .unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, Error>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("invalid {key}={value:?}: {e}")))
}
