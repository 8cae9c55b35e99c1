//! Common types and utilities for the NGAP bridge
//!
//! Shared error type, logging setup and the bridge configuration used by the
//! other `ngbridge-*` crates.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AmfTransport, BridgeConfig, CliOverrides};
pub use error::Error;
pub use logging::{
    format_hex_compact, init_logging, init_logging_with_filter, log_ngap_message,
    log_protocol_message, Direction, HexDump, LogLevel,
};
