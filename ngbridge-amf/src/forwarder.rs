//! Duplex forwarder between the gNB stream and the AMF session
//!
//! Bytes are relayed unmodified in both directions. Each wait is bounded by
//! the poll interval so a stopping bridge is noticed even on a silent link.

use std::time::Duration;

use bytes::Bytes;
use ngbridge_common::logging::{log_ngap_message, Direction};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::bridge::RunningFlag;
use crate::error::Result;
use crate::registry::ConnectionHandle;
use crate::transport::SecondarySession;

/// Bytes relayed per direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    pub inbound_to_secondary: u64,
    pub secondary_to_inbound: u64,
}

enum Ready {
    Inbound(std::io::Result<usize>),
    Secondary(std::io::Result<Option<Bytes>>),
    Closed,
}

/// Relays between `inbound` and `secondary` until either side closes, an
/// I/O error occurs, or the connection is stopped.
///
/// `secondary` is closed before returning, on every path.
pub async fn forward<S>(
    inbound: &mut S,
    secondary: &mut dyn SecondarySession,
    handle: &ConnectionHandle,
    running: &RunningFlag,
    poll: Duration,
    buffer_size: usize,
) -> Result<ForwardStats>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stats = ForwardStats::default();
    let result = relay(inbound, secondary, handle, running, poll, buffer_size, &mut stats).await;
    secondary.close().await;

    debug!(
        "[{}] Relayed {} bytes to AMF, {} bytes to gNB",
        handle.id(),
        stats.inbound_to_secondary,
        stats.secondary_to_inbound
    );
    result.map(|()| stats)
}

async fn relay<S>(
    inbound: &mut S,
    secondary: &mut dyn SecondarySession,
    handle: &ConnectionHandle,
    running: &RunningFlag,
    poll: Duration,
    buffer_size: usize,
    stats: &mut ForwardStats,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size.max(1)];

    while running.is_running() && !handle.is_closed() {
        let ready = timeout(poll, async {
            tokio::select! {
                read = inbound.read(&mut buf) => Ready::Inbound(read),
                msg = secondary.recv() => Ready::Secondary(msg),
                _ = handle.closed() => Ready::Closed,
            }
        })
        .await;

        match ready {
            Err(_) => continue,
            Ok(Ready::Closed) => break,
            Ok(Ready::Inbound(read)) => {
                let n = read?;
                if n == 0 {
                    info!("[{}] gNB closed the connection", handle.id());
                    break;
                }
                log_ngap_message(Direction::Rx, "gNB -> AMF", &buf[..n]);
                secondary.send(&buf[..n]).await?;
                stats.inbound_to_secondary += n as u64;
            }
            Ok(Ready::Secondary(msg)) => match msg? {
                Some(msg) => {
                    log_ngap_message(Direction::Tx, "AMF -> gNB", &msg);
                    inbound.write_all(&msg).await?;
                    stats.secondary_to_inbound += msg.len() as u64;
                }
                None => {
                    info!("[{}] AMF closed the association", handle.id());
                    break;
                }
            },
        }
    }

    Ok(())
}
