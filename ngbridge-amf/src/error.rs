//! Bridge error types

use std::net::SocketAddr;

use ngbridge_ngap::TemplateError;
use thiserror::Error;

use crate::registry::RegistryError;

/// Errors raised by the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The TCP listener could not be bound. Fatal at startup.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// I/O on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A reply could not be built
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Connection bookkeeping failed
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
