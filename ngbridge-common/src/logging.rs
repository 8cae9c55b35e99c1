//! Logging infrastructure for the bridge
//!
//! Configurable logging on top of the `tracing` crate, plus the helpers the
//! bridge uses to log NGAP traffic with an optional hex payload.

use std::fmt;
use tracing::Level;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

/// Initialize the tracing subscriber with the specified log level.
///
/// Call once at startup. `RUST_LOG` takes precedence over `level`.
///
/// # Example
///
/// ```no_run
/// use ngbridge_common::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Debug);
/// ```
pub fn init_logging(level: LogLevel) {
    init_logging_with_filter(&level.to_string());
}

/// Initialize logging with a custom filter string.
///
/// # Example
///
/// ```no_run
/// use ngbridge_common::logging::init_logging_with_filter;
///
/// // Info everywhere, but trace the forwarder
/// init_logging_with_filter("info,ngbridge_amf::forwarder=trace");
/// ```
pub fn init_logging_with_filter(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // A second init (e.g. from a test harness) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_span_events(FmtSpan::NONE)
        .try_init();
}

/// Traffic direction for logging, seen from the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received by the bridge
    Rx,
    /// Sent by the bridge
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rx => write!(f, "RX"),
            Direction::Tx => write!(f, "TX"),
        }
    }
}

/// Log a protocol message at debug level with a hex dump at trace level.
///
/// # Example
///
/// ```
/// use ngbridge_common::logging::{log_protocol_message, Direction};
///
/// log_protocol_message("NGAP", Direction::Rx, "NG Setup Request", &[0x00, 0x15]);
/// ```
pub fn log_protocol_message(protocol: &str, direction: Direction, msg_type: &str, data: &[u8]) {
    tracing::debug!(
        protocol = protocol,
        direction = %direction,
        msg_type = msg_type,
        len = data.len(),
        "{} {} message",
        direction,
        protocol
    );
    tracing::trace!(
        protocol = protocol,
        hex = %HexDump(data),
        "{} payload",
        protocol
    );
}

/// Log an NGAP message
pub fn log_ngap_message(direction: Direction, msg_type: &str, data: &[u8]) {
    log_protocol_message("NGAP", direction, msg_type, data);
}

/// Wrapper for hex dump formatting
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Format bytes as a compact hex string, optionally grouped.
///
/// `group_size` of 0 disables grouping.
///
/// ```
/// use ngbridge_common::logging::format_hex_compact;
///
/// let data = [0x20, 0x15, 0x00, 0x24];
/// assert_eq!(format_hex_compact(&data, 0), "20150024");
/// assert_eq!(format_hex_compact(&data, 2), "2015 0024");
/// ```
pub fn format_hex_compact(data: &[u8], group_size: usize) -> String {
    if group_size == 0 {
        return hex::encode(data);
    }

    data.chunks(group_size)
        .map(hex::encode)
        .collect::<Vec<_>>()
        .join(" ")
}
