//! Mock AMF responder
//!
//! Runs a MOCK mode connection: every inbound message goes through the
//! [`Session`], replies are written back in full, and a quiet established
//! session gets a liveness probe after each receive timeout.

use std::time::Duration;

use ngbridge_common::logging::{log_ngap_message, Direction};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::bridge::RunningFlag;
use crate::error::Result;
use crate::registry::ConnectionHandle;
use crate::session::{Session, SessionAction};

/// Timing and buffering of the mock loop
#[derive(Debug, Clone, Copy)]
pub struct MockOptions {
    /// Wait for inbound data before considering a liveness probe
    pub recv_timeout: Duration,
    /// Close after this long without inbound data
    pub idle_timeout: Option<Duration>,
    /// Largest single read
    pub buffer_size: usize,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_secs(5),
            idle_timeout: None,
            buffer_size: 4096,
        }
    }
}

/// Why the mock loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockExit {
    /// The gNB closed its side
    PeerClosed,
    /// No inbound data within the idle bound
    Idle,
    /// The handle was closed or the bridge is stopping
    Stopped,
}

/// Serves one MOCK mode connection until it ends.
///
/// I/O errors end the loop and are returned to the caller.
pub async fn run_mock<S>(
    stream: &mut S,
    session: &mut Session,
    handle: &ConnectionHandle,
    running: &RunningFlag,
    options: &MockOptions,
) -> Result<MockExit>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; options.buffer_size.max(1)];
    session.begin();

    loop {
        if !running.is_running() || handle.is_closed() {
            return Ok(MockExit::Stopped);
        }

        let read = tokio::select! {
            read = timeout(options.recv_timeout, stream.read(&mut buf)) => read,
            _ = handle.closed() => return Ok(MockExit::Stopped),
        };

        let n = match read {
            Err(_) => {
                if let Some(probe) = session.on_receive_timeout() {
                    debug!("[{}] Sending liveness probe", handle.id());
                    stream.write_all(&probe).await?;
                }
                if let Some(limit) = options.idle_timeout {
                    if session.idle_exceeded(limit) {
                        info!("[{}] Idle for more than {:?}, closing", handle.id(), limit);
                        return Ok(MockExit::Idle);
                    }
                }
                continue;
            }
            Ok(read) => read?,
        };

        if n == 0 {
            info!("[{}] Connection closed by gNB", handle.id());
            return Ok(MockExit::PeerClosed);
        }

        let data = &buf[..n];
        log_ngap_message(Direction::Rx, "gNB message", data);

        match session.on_message(data)? {
            SessionAction::Reply(reply) => {
                let msg_type = if session.is_established() {
                    "NG Setup Response"
                } else {
                    "NG Setup Failure"
                };
                info!("[{}] Sending {} ({} bytes)", handle.id(), msg_type, reply.len());
                log_ngap_message(Direction::Tx, msg_type, &reply);
                stream.write_all(&reply).await?;
            }
            SessionAction::Acknowledge | SessionAction::Forward => {}
        }
    }
}
