//! ngbridge-amf - NGAP bridge towards the AMF
#![allow(missing_docs)]
//!
//! Lets a gNB simulator reach an AMF over plain TCP. Each accepted
//! connection is either relayed to the real AMF over SCTP (BRIDGE mode) or
//! answered by a minimal mock AMF that handles NG Setup (MOCK mode). The mode
//! is decided per connection by probing the AMF transport.
//!
//! ```text
//!                     ┌──────────────────────── ngap-bridge ───────────────────────┐
//!   gNB ──TCP──▶ AmfBridge ──▶ probe ──┬─ session up ──▶ forwarder ──SCTP──▶ AMF
//!                  │                   └─ no session ──▶ mock responder
//!                  └── ConnectionRegistry (one handle per live connection)
//!                     └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `bridge` - acceptor, per-connection task, shutdown
//! - `registry` - live connections and their close signals
//! - `session` - per-connection state machine and reply decisions
//! - `mock` - MOCK mode loop with liveness probes
//! - `forwarder` - BRIDGE mode duplex relay
//! - `transport` - AMF transport capability (kernel SCTP, SCTP over UDP, or none)
//!
//! # Example
//!
//! ```rust,no_run
//! use ngbridge_amf::AmfBridge;
//! use ngbridge_common::BridgeConfig;
//!
//! async fn serve() -> Result<(), ngbridge_amf::BridgeError> {
//!     let bridge = AmfBridge::new(BridgeConfig::default());
//!     let listener = bridge.bind().await?;
//!     bridge.announce_mode().await;
//!     bridge.run(listener).await
//! }
//! ```

pub mod bridge;
pub mod error;
pub mod forwarder;
pub mod mock;
pub mod registry;
pub mod session;
pub mod transport;

pub use bridge::{AmfBridge, RunningFlag};
pub use error::{BridgeError, Result};
pub use forwarder::{forward, ForwardStats};
pub use mock::{run_mock, MockExit, MockOptions};
pub use registry::{ConnectionHandle, ConnectionRegistry, RegistryError};
pub use session::{BridgeMode, Session, SessionAction, SessionState};
pub use transport::{
    probe_secondary_transport, Probe, SctpTransport, SecondarySession, SecondaryTransport,
    UdpSctpTransport, UnavailableTransport,
};
