//! Registry of live connections
//!
//! Maps a connection identifier (the peer's `ip:port`) to a
//! [`ConnectionHandle`]. The acceptor adds an entry per accepted connection,
//! the connection task removes it on teardown, and shutdown closes whatever
//! is left. A single mutex guards the map; it is never held across an await.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Notify;
use tracing::debug;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A live connection already uses this identifier
    #[error("Connection {0} already registered")]
    Duplicate(String),
}

struct HandleInner {
    id: String,
    peer: SocketAddr,
    created_at: Instant,
    closed: AtomicBool,
    notify: Notify,
}

/// Shared view of one live connection.
///
/// Clones refer to the same connection. Closing is idempotent and wakes every
/// task waiting in [`ConnectionHandle::closed`].
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

impl ConnectionHandle {
    /// Handle for a connection from `peer`, identified by its address
    pub fn new(peer: SocketAddr) -> Self {
        Self::with_id(peer.to_string(), peer)
    }

    /// Handle with an explicit identifier
    pub fn with_id(id: impl Into<String>, peer: SocketAddr) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: id.into(),
                peer,
                created_at: Instant::now(),
                closed: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.inner.peer
    }

    pub fn created_at(&self) -> Instant {
        self.inner.created_at
    }

    /// Time since the connection was accepted
    pub fn age(&self) -> Duration {
        self.inner.created_at.elapsed()
    }

    /// Signals the owning task to stop. Returns `true` on the first call.
    pub fn close(&self) -> bool {
        let first = !self.inner.closed.swap(true, Ordering::AcqRel);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Completes once the handle is closed. Cancel-safe.
    pub async fn closed(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("peer", &self.inner.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Live connections by identifier
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConnectionHandle>> {
        // A panicking holder cannot leave the map half-updated
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a connection under its identifier
    pub fn add(&self, handle: ConnectionHandle) -> Result<(), RegistryError> {
        let mut connections = self.lock();
        if connections.contains_key(handle.id()) {
            return Err(RegistryError::Duplicate(handle.id().to_string()));
        }
        debug!("Registered connection {}", handle.id());
        connections.insert(handle.id().to_string(), handle);
        Ok(())
    }

    /// Removes a connection; `None` if it was not registered
    pub fn remove(&self, id: &str) -> Option<ConnectionHandle> {
        let removed = self.lock().remove(id);
        if removed.is_some() {
            debug!("Unregistered connection {}", id);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<ConnectionHandle> {
        self.lock().get(id).cloned()
    }

    /// Point-in-time copy of every registered handle
    pub fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.lock().values().cloned().collect()
    }

    /// Closes every registered connection and empties the registry.
    ///
    /// Returns the number of connections that were registered.
    pub fn close_all(&self) -> usize {
        let drained: Vec<ConnectionHandle> = self.lock().drain().map(|(_, h)| h).collect();
        for handle in &drained {
            handle.close();
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
