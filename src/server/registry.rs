//! # Client Registry
//!
//! The single source of truth for who is connected.
//!
//! Each entry owns the sending side of its session's outbound queue and a
//! close signal. Together they are the connection handle: while the entry
//! exists the session keeps running, and dropping it (via
//! [`ClientRegistry::unregister`] or [`ClientRegistry::drain_all`]) tells the
//! session to close its socket, even when it is stuck writing to a peer that
//! stopped reading.
//!
//! Every operation takes the lock once and releases it before returning.
//! Nothing here awaits or touches a socket, so no lock is ever held across
//! network I/O.

use log::debug;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Identity of one accepted connection.
pub type ConnectionId = Uuid;

/// Capacity of each session's outbound queue.
const OUTBOUND_QUEUE_SIZE: usize = 100;

struct ConnectionEntry {
    peer_addr: SocketAddr,
    outbound: mpsc::Sender<String>,
    // Never sent on; dropping it is the signal
    _close: oneshot::Sender<()>,
}

/// What a session receives when it is registered.
pub struct Registration {
    pub id: ConnectionId,
    /// Messages pushed to this connection by other parts of the server.
    /// Yields `None` once the registry has dropped the entry.
    pub outbound: mpsc::Receiver<String>,
    /// Resolves once the registry has dropped the entry.
    pub closed: oneshot::Receiver<()>,
}

/// Lock-guarded table of open connections.
#[derive(Default)]
pub struct ClientRegistry {
    entries: Mutex<HashMap<ConnectionId, ConnectionEntry>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection and hand back its id and outbound queue.
    pub fn register(&self, peer_addr: SocketAddr) -> Registration {
        let id = Uuid::new_v4();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        let (close_tx, close_rx) = oneshot::channel();

        self.lock().insert(
            id,
            ConnectionEntry {
                peer_addr,
                outbound: outbound_tx,
                _close: close_tx,
            },
        );
        debug!("📝 Registered connection {} from {}", id, peer_addr);

        Registration {
            id,
            outbound: outbound_rx,
            closed: close_rx,
        }
    }

    /// Remove a connection. Unknown ids are ignored, since a session and a
    /// shutdown drain may race to remove the same entry.
    pub fn unregister(&self, id: ConnectionId) {
        if self.lock().remove(&id).is_some() {
            debug!("🗑️  Unregistered connection {}", id);
        }
    }

    /// Queue `message` for every connection except `exclude`.
    ///
    /// Best effort: a full or closed queue is skipped silently. Returns how
    /// many connections accepted the message.
    pub fn broadcast(&self, message: &str, exclude: Option<ConnectionId>) -> usize {
        let entries = self.lock();
        entries
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .filter(|(_, entry)| entry.outbound.try_send(message.to_string()).is_ok())
            .count()
    }

    /// Close every connection handle and empty the table in one step.
    ///
    /// Returns the number of connections that were closed.
    pub fn drain_all(&self) -> usize {
        let mut entries = self.lock();
        let drained = entries.len();
        // Dropping the entries closes each session's queue and fires its close signal
        entries.clear();
        drained
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of connected peers.
    pub fn peers(&self) -> Vec<(ConnectionId, SocketAddr)> {
        self.lock()
            .iter()
            .map(|(id, entry)| (*id, entry.peer_addr))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, ConnectionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
