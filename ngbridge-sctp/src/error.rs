//! SCTP transport errors

use std::io;

use thiserror::Error;

/// SCTP association errors
#[derive(Debug, Error)]
pub enum SctpError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Association closed")]
    AssociationClosed,
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type for SCTP operations
pub type Result<T> = std::result::Result<T, SctpError>;

impl SctpError {
    /// True when SCTP itself cannot be used on this host (no kernel
    /// support, or not permitted), as opposed to the peer not answering.
    pub fn is_unsupported(&self) -> bool {
        match self {
            SctpError::Io(e) => {
                matches!(
                    e.kind(),
                    io::ErrorKind::PermissionDenied | io::ErrorKind::Unsupported
                ) || is_unsupported_errno(e)
            }
            _ => false,
        }
    }
}

#[cfg(all(feature = "kernel", unix))]
fn is_unsupported_errno(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(
            libc::EPROTONOSUPPORT
                | libc::ESOCKTNOSUPPORT
                | libc::EAFNOSUPPORT
                | libc::EPERM
                | libc::EACCES
        )
    )
}

#[cfg(not(all(feature = "kernel", unix)))]
fn is_unsupported_errno(_e: &io::Error) -> bool {
    false
}
