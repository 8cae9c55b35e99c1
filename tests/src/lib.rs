//! Integration test framework for the NGAP bridge
#![allow(missing_docs)]
//!
//! Helpers shared by the scenario test targets in this crate.
//!
//! # Components
//!
//! - [`loopback_amf`] - TCP stand-in for the AMF transport, plus an echoing AMF
//! - [`sctp_amf`] - echoing AMFs over SCTP (`sctp-proto` over UDP, and kernel)
//! - [`test_fixtures`] - bridge configurations, sample messages, a running bridge
//! - [`test_utils`] - logging and polling helpers
//!
//! # Test Categories
//!
//! 1. **Mock mode** - concurrent gNBs answered by the mock AMF
//! 2. **Bridge mode** - bytes relayed unmodified to an echoing AMF, over the
//!    loopback and over real SCTP transports
//! 3. **Shutdown** - stop empties the registry and closes every connection

pub mod loopback_amf;
pub mod test_fixtures;

pub use loopback_amf::{EchoAmf, LoopbackTransport};
#[cfg(unix)]
pub use sctp_amf::KernelSctpEchoAmf;
pub use sctp_amf::UdpSctpEchoAmf;
pub use test_fixtures::{
    garbage_message, mock_config, setup_request, RunningBridge, TEST_LOCALHOST,
};
pub use test_utils::{
    init_test_logging, read_reply, wait_for_condition, TestResult, DEFAULT_POLL_INTERVAL,
    DEFAULT_TEST_TIMEOUT,
};
