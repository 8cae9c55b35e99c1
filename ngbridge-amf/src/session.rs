//! Per-connection session state machine
//!
//! ```text
//!   New --begin--> AwaitingSetup --setup request / bridged--> Established
//!    |                  |                                        |
//!    +------------------+-------------- close -------------------+--> Closed
//! ```
//!
//! In MOCK mode the session decides every reply itself. In BRIDGE mode it
//! only tracks state; the real AMF does the answering.

use std::time::{Duration, Instant};

use bytes::Bytes;
use ngbridge_ngap::{
    build_setup_failure, build_setup_success, decode_header, TemplateError, LIVENESS_PROBE,
    UNRECOGNIZED_CAUSE,
};
use tracing::{debug, trace};

/// How a connection reaches (or imitates) the AMF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// Bytes are relayed to the real AMF
    Bridge,
    /// Replies are synthesized locally
    Mock,
}

impl std::fmt::Display for BridgeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeMode::Bridge => write!(f, "BRIDGE"),
            BridgeMode::Mock => write!(f, "MOCK"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    AwaitingSetup,
    Established,
    Closed,
}

/// What the connection task should do with an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Write these bytes back to the gNB
    Reply(Bytes),
    /// Relay the message to the AMF unchanged
    Forward,
    /// Accept the message without answering
    Acknowledge,
}

/// State of one connection
#[derive(Debug)]
pub struct Session {
    mode: BridgeMode,
    state: SessionState,
    last_activity: Instant,
    messages: u64,
}

impl Session {
    pub fn new(mode: BridgeMode) -> Self {
        Self {
            mode,
            state: SessionState::New,
            last_activity: Instant::now(),
            messages: 0,
        }
    }

    pub fn mode(&self) -> BridgeMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Inbound messages seen so far
    pub fn messages(&self) -> u64 {
        self.messages
    }

    pub fn is_established(&self) -> bool {
        self.state == SessionState::Established
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// The connection is live and waits for its first message
    pub fn begin(&mut self) {
        if self.state == SessionState::New {
            self.state = SessionState::AwaitingSetup;
        }
    }

    /// Relaying to the real AMF has started
    pub fn mark_bridged(&mut self) {
        if self.mode == BridgeMode::Bridge && !self.is_closed() {
            self.state = SessionState::Established;
        }
    }

    /// Decides what to do with one inbound message.
    ///
    /// A closed session acknowledges everything without changing state.
    pub fn on_message(&mut self, data: &[u8]) -> Result<SessionAction, TemplateError> {
        if self.is_closed() {
            return Ok(SessionAction::Acknowledge);
        }

        self.messages += 1;
        self.last_activity = Instant::now();

        if self.mode == BridgeMode::Bridge {
            return Ok(SessionAction::Forward);
        }

        self.begin();
        if self.is_established() {
            trace!("Mock session absorbed {} bytes", data.len());
            return Ok(SessionAction::Acknowledge);
        }

        match decode_header(data) {
            Some(header) if header.is_setup_request() => {
                if !header.declared_length_matches() {
                    debug!(
                        "NG Setup Request declares {} bytes but carries {}",
                        header.length,
                        header.payload.len()
                    );
                }
                self.state = SessionState::Established;
                Ok(SessionAction::Reply(build_setup_success().to_bytes()))
            }
            _ => {
                debug!("Unrecognized first message ({} bytes)", data.len());
                Ok(SessionAction::Reply(build_setup_failure(UNRECOGNIZED_CAUSE)?.to_bytes()))
            }
        }
    }

    /// Called when a receive wait elapsed without data.
    ///
    /// Returns the liveness probe to send, if any.
    pub fn on_receive_timeout(&self) -> Option<Bytes> {
        (self.mode == BridgeMode::Mock && self.is_established())
            .then(|| Bytes::from_static(&LIVENESS_PROBE))
    }

    /// Whether no inbound data arrived for longer than `limit`
    pub fn idle_exceeded(&self, limit: Duration) -> bool {
        self.last_activity.elapsed() > limit
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}
