//! # Session Handler
//!
//! One [`Session`] runs per accepted connection:
//!
//! ```text
//! socket --read--> reader task --inbound--> session loop --dispatch--> store
//!                                             |    ^
//!                              reply / push   |    | outbound (registry)
//!                                             v    |
//! socket <--------------------write------------
//! ```
//!
//! Reading happens on a separate task so the session loop only ever waits on
//! channels, which can be raced with `select!` without losing half-read frames.
//!
//! The loop ends when the peer closes or errors, a write fails, the registry
//! drops this session's handle, or the server shutdown flag is raised. Writes
//! are raced against the last two, so a peer that stops reading cannot hold the
//! session open past shutdown. The session then unregisters itself and only
//! afterwards closes the socket.

use log::{debug, info, warn};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, oneshot, watch};

use super::protocol::dispatch;
use super::registry::{ClientRegistry, ConnectionId, Registration};
use crate::common::connection::{Connection, MAX_FRAME_SIZE};
use crate::common::messages::Reply;
use crate::contacts::ContactStore;

/// Why a session loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closed the stream, or reading failed
    PeerClosed,
    /// Writing a reply or pushed message failed
    SendFailed,
    /// The registry dropped this connection's handle
    Evicted,
    /// The server is stopping
    Shutdown,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SessionEnd::PeerClosed => "peer closed",
            SessionEnd::SendFailed => "send failed",
            SessionEnd::Evicted => "closed by server",
            SessionEnd::Shutdown => "server shutdown",
        };
        f.write_str(reason)
    }
}

/// State owned by one connection for its whole lifetime.
pub struct Session<S> {
    id: ConnectionId,
    peer_addr: SocketAddr,
    conn: Connection,
    outbound: mpsc::Receiver<String>,
    closed: oneshot::Receiver<()>,
    store: S,
    registry: Arc<ClientRegistry>,
    shutdown: watch::Receiver<bool>,
}

impl<S> Session<S>
where
    S: ContactStore + Send + 'static,
{
    pub fn new(
        conn: Connection,
        peer_addr: SocketAddr,
        registration: Registration,
        registry: Arc<ClientRegistry>,
        store: S,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id: registration.id,
            peer_addr,
            conn,
            outbound: registration.outbound,
            closed: registration.closed,
            store,
            registry,
            shutdown,
        }
    }

    /// Serve the connection until it ends, then clean up.
    pub async fn run(self) -> SessionEnd {
        let Session {
            id,
            peer_addr,
            conn,
            mut outbound,
            mut closed,
            mut store,
            registry,
            mut shutdown,
        } = self;

        let (mut reader, mut writer) = conn.into_split();
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<String>(1);

        let reader_task = tokio::spawn(async move {
            loop {
                match reader.read_message().await {
                    Ok(Some(text)) => {
                        if inbound_tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("⚠️  Receive error from {}: {}", peer_addr, e);
                        break;
                    }
                }
            }
        });

        let end = loop {
            tokio::select! {
                inbound = inbound_rx.recv() => {
                    let Some(text) = inbound else {
                        break SessionEnd::PeerClosed;
                    };
                    debug!("📥 Received from {}: {:?}", peer_addr, text);

                    let mut reply = dispatch(&mut store, &text).to_string();
                    if reply.len() > MAX_FRAME_SIZE {
                        warn!(
                            "⚠️  Reply to {} is {} bytes, over the {} byte frame limit",
                            peer_addr,
                            reply.len(),
                            MAX_FRAME_SIZE
                        );
                        reply = Reply::ContactListTooLarge.to_string();
                    }
                    if let Err(end) = send(&mut writer, peer_addr, &reply, &mut shutdown, &mut closed).await {
                        break end;
                    }
                }
                pushed = outbound.recv() => {
                    let Some(message) = pushed else {
                        break SessionEnd::Evicted;
                    };
                    if let Err(end) = send(&mut writer, peer_addr, &message, &mut shutdown, &mut closed).await {
                        break end;
                    }
                }
                _ = &mut closed => break SessionEnd::Evicted,
                _ = shutdown_requested(&mut shutdown) => break SessionEnd::Shutdown,
            }
        };

        // Unregister before the socket goes away
        registry.unregister(id);
        reader_task.abort();
        if let Err(e) = writer.shutdown().await {
            debug!("Socket shutdown for {} failed: {}", peer_addr, e);
        }
        drop(writer);

        info!("👋 Client {} disconnected ({})", peer_addr, end);
        end
    }
}

/// Write one message unless the server stops or evicts this session first.
async fn send(
    writer: &mut Connection<OwnedWriteHalf>,
    peer_addr: SocketAddr,
    text: &str,
    shutdown: &mut watch::Receiver<bool>,
    closed: &mut oneshot::Receiver<()>,
) -> Result<(), SessionEnd> {
    tokio::select! {
        written = writer.write_message(text) => written.map_err(|e| {
            warn!("⚠️  Failed to send to {}: {}", peer_addr, e);
            SessionEnd::SendFailed
        }),
        _ = closed => Err(SessionEnd::Evicted),
        _ = shutdown_requested(shutdown) => Err(SessionEnd::Shutdown),
    }
}

/// Resolves once the shutdown flag is raised or the server is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
