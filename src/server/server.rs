//! # Contact Server
//!
//! Owns the listening socket, the client registry, and the shutdown flag for
//! one server instance. Several instances can run side by side in a process.
//!
//! ## Lifecycle
//!
//! ```text
//! Stopped --start()--> Running --stop()--> Stopped
//! ```
//!
//! `start` binds the listener and spawns the acceptor task. `stop` raises the
//! shutdown flag, which makes the acceptor drop the listener, then drains the
//! registry so every open session closes its socket, and finally waits for the
//! acceptor and all sessions to finish.
//!
//! There is no cap on concurrent sessions: every accepted connection gets its
//! own task for as long as the peer stays connected.

use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use super::config::{ServerConfig, StoreMode};
use super::registry::ClientRegistry;
use super::session::{Session, SessionEnd};
use crate::common::codec::XorCodec;
use crate::common::config::{Framing, WireConfig};
use crate::common::connection::Connection;
use crate::contacts::{ContactBook, SharedContactBook};

/// Pause after a failed `accept` (e.g. out of file descriptors).
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

enum ServerState {
    Stopped,
    Running(RunningServer),
}

struct RunningServer {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    acceptor: JoinHandle<()>,
    shared: Option<SharedContactBook>,
}

/// Where sessions get their store from.
#[derive(Clone)]
enum StoreSource {
    /// Each session clones the seed
    PerSession(ContactBook),
    Shared(SharedContactBook),
}

/// A contact-sync server instance.
///
/// # Example
/// ```ignore
/// let mut server = ContactServer::new("127.0.0.1:8080".parse()?)
///     .with_seed(ContactBook::load("contacts.json")?);
/// let addr = server.start().await?;
/// // ...
/// server.stop().await;
/// ```
pub struct ContactServer {
    listen_addr: SocketAddr,
    wire: WireConfig,
    store_mode: StoreMode,
    seed: ContactBook,
    registry: Arc<ClientRegistry>,
    state: ServerState,
}

impl ContactServer {
    /// Create a stopped server that will listen on `listen_addr`.
    ///
    /// The address is used as given; port validation belongs to the
    /// configuration layer (see [`ServerConfig::listen_addr`]).
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            wire: WireConfig::default(),
            store_mode: StoreMode::default(),
            seed: ContactBook::new(),
            registry: Arc::new(ClientRegistry::new()),
            state: ServerState::Stopped,
        }
    }

    /// Create a stopped server from a loaded configuration and seed contacts.
    pub fn from_config(config: &ServerConfig, seed: ContactBook) -> Result<Self> {
        Ok(Self::new(config.listen_addr()?)
            .with_wire(config.wire.clone())
            .with_store_mode(config.store.mode)
            .with_seed(seed))
    }

    pub fn with_wire(mut self, wire: WireConfig) -> Self {
        self.wire = wire;
        self
    }

    pub fn with_store_mode(mut self, mode: StoreMode) -> Self {
        self.store_mode = mode;
        self
    }

    /// Contacts every session starts from (per-session mode) or the initial
    /// content of the shared store.
    pub fn with_seed(mut self, seed: ContactBook) -> Self {
        self.seed = seed;
        self
    }

    /// Bind the listener and start accepting connections.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested.
    ///
    /// # Errors
    /// Fails if the server is already running, the wire key is empty, or the
    /// address cannot be bound. A failed start leaves the server stopped.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let ServerState::Running(running) = &self.state {
            bail!("server is already running on {}", running.local_addr);
        }

        let codec = self.wire.codec()?;
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.listen_addr))?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (source, shared) = match self.store_mode {
            StoreMode::PerSession => (StoreSource::PerSession(self.seed.clone()), None),
            StoreMode::Shared => {
                let shared = SharedContactBook::new(self.seed.clone());
                (StoreSource::Shared(shared.clone()), Some(shared))
            }
        };

        let acceptor = Acceptor {
            listener,
            registry: Arc::clone(&self.registry),
            codec,
            framing: self.wire.framing,
            source,
            shutdown: shutdown_rx,
        };
        let acceptor = tokio::spawn(acceptor.run());

        info!(
            "🚀 Server started on {} ({:?} framing, {:?} store)",
            local_addr, self.wire.framing, self.store_mode
        );

        self.state = ServerState::Running(RunningServer {
            local_addr,
            shutdown_tx,
            acceptor,
            shared,
        });
        Ok(local_addr)
    }

    /// Stop accepting, close every open session, and wait for them to end.
    ///
    /// Returns the final content of the shared store in shared mode. Stopping a
    /// stopped server does nothing.
    pub async fn stop(&mut self) -> Option<ContactBook> {
        let ServerState::Running(running) =
            std::mem::replace(&mut self.state, ServerState::Stopped)
        else {
            return None;
        };

        let _ = running.shutdown_tx.send(true);
        let closed = self.registry.drain_all();
        info!("🛑 Stopping server: closing {} connection(s)", closed);

        if let Err(e) = running.acceptor.await {
            error!("❌ Acceptor task failed: {}", e);
        }

        info!("✅ Server stopped");
        running.shared.map(|shared| shared.snapshot())
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ServerState::Running(_))
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            ServerState::Running(running) => Some(running.local_addr),
            ServerState::Stopped => None,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Push `message` to every connected client.
    pub fn broadcast(&self, message: &str) -> usize {
        self.registry.broadcast(message, None)
    }
}

impl Drop for ContactServer {
    fn drop(&mut self) {
        if let ServerState::Running(running) = &self.state {
            let _ = running.shutdown_tx.send(true);
            self.registry.drain_all();
        }
    }
}

/// Accept loop running on its own task while the server is up.
struct Acceptor {
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    codec: XorCodec,
    framing: Framing,
    source: StoreSource,
    shutdown: watch::Receiver<bool>,
}

impl Acceptor {
    async fn run(mut self) {
        let mut sessions: JoinSet<SessionEnd> = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        info!("🔗 Client connected from {}", peer_addr);
                        self.spawn_session(&mut sessions, socket, peer_addr);
                    }
                    Err(e) => {
                        // Transient: pause, then keep accepting
                        if !*self.shutdown.borrow() {
                            error!("❌ Failed to accept client connection: {}", e);
                        }
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                },
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        warn!("⚠️  Session task ended abnormally: {}", e);
                    }
                }
                _ = self.shutdown.changed() => break,
            }
        }

        drop(self.listener);
        info!("📴 Listener closed, waiting for {} session(s)", sessions.len());

        while let Some(finished) = sessions.join_next().await {
            if let Err(e) = finished {
                warn!("⚠️  Session task ended abnormally: {}", e);
            }
        }
    }

    fn spawn_session(
        &self,
        sessions: &mut JoinSet<SessionEnd>,
        socket: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) {
        let registration = self.registry.register(peer_addr);
        let conn = Connection::new(socket, self.codec.clone(), self.framing);
        let registry = Arc::clone(&self.registry);
        let shutdown = self.shutdown.clone();

        match &self.source {
            StoreSource::PerSession(seed) => {
                let session = Session::new(
                    conn,
                    peer_addr,
                    registration,
                    registry,
                    seed.clone(),
                    shutdown,
                );
                sessions.spawn(session.run());
            }
            StoreSource::Shared(shared) => {
                let session = Session::new(
                    conn,
                    peer_addr,
                    registration,
                    registry,
                    shared.clone(),
                    shutdown,
                );
                sessions.spawn(session.run());
            }
        }
    }
}
