//! SCTP client transport for the NGAP bridge
#![allow(missing_docs)]
//!
//! Two client transports, each behind a cargo feature:
//!
//! - `kernel` - [`KernelSctpStream`], a one-to-one socket from the host SCTP
//!   stack. This is what stock AMFs (Open5GS and the like) listen on.
//! - `udp` - [`SctpAssociation`], the sans-IO `sctp-proto` state machine
//!   driven over a UDP socket. Wire compatible with other `sctp-proto` peers
//!   only.
//!
//! Only the client side is provided: the bridge opens one association per
//! accepted TCP connection and relays NGAP messages over it.
//!
//! # Example
//!
//! ```rust,no_run
//! use ngbridge_sctp::{SctpAssociation, SctpConfig};
//! use std::net::SocketAddr;
//!
//! async fn relay_one() -> Result<(), Box<dyn std::error::Error>> {
//!     let amf_addr: SocketAddr = "127.0.0.5:38413".parse()?;
//!     let mut assoc = SctpAssociation::connect(amf_addr, SctpConfig::default()).await?;
//!
//!     assoc.send(0, b"NGAP message").await?;
//!     if let Some(reply) = assoc.recv().await? {
//!         println!("AMF replied with {} bytes", reply.len());
//!     }
//!
//!     assoc.shutdown().await?;
//!     Ok(())
//! }
//! ```

#[cfg(feature = "udp")]
pub mod association;
pub mod error;
#[cfg(all(feature = "kernel", unix))]
pub mod kernel;

/// NGAP Payload Protocol Identifier (PPID) as defined in 3GPP TS 38.412
pub const NGAP_PPID: u32 = 60;

#[cfg(feature = "udp")]
pub use association::{
    AssociationState, SctpAssociation, SctpConfig, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_NUM_STREAMS,
    DEFAULT_RECEIVE_BUFFER_SIZE,
};
pub use error::{Result, SctpError};
#[cfg(all(feature = "kernel", unix))]
pub use kernel::KernelSctpStream;
