//! # Sync Client
//!
//! Drives the server protocol from the initiating side.
//!
//! ## Synchronization
//!
//! ```text
//! client                         server
//!   | ---- SYNC: --------------->  |
//!   | <--- SYNC_READY -----------  |
//!   | ---- GET_CONTACTS -------->  |
//!   | <--- CONTACTS:a|b|... -----  |
//! ```
//!
//! Each call opens exactly one connection and closes it before returning.
//! Nothing is retried. The local store is only touched after the final reply
//! has been received and parsed, and then it is replaced wholesale.

use anyhow::{Context, Result};
use log::{debug, info};
use tokio::net::TcpStream;

use crate::common::codec::XorCodec;
use crate::common::config::{Framing, WireConfig};
use crate::common::connection::{Connection, WireError};
use crate::common::messages::{Command, Reply, CONTACTS_PREFIX, SYNC_READY};
use crate::contacts::{Contact, ContactError, ContactStore};

/// Failures specific to the sync conversation.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The server answered with something other than what this step needs.
    #[error("unexpected reply to {request}: expected {expected}, got {actual:?}")]
    UnexpectedReply {
        request: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// The server closed the connection before replying.
    #[error("connection closed while waiting for reply to {request}")]
    ConnectionClosed { request: &'static str },

    #[error("invalid contact: {0}")]
    InvalidContact(#[from] ContactError),
}

/// Client side of the contact protocol.
#[derive(Debug, Clone)]
pub struct SyncClient {
    codec: XorCodec,
    framing: Framing,
}

impl SyncClient {
    /// Build a client speaking the given wire settings.
    pub fn new(wire: &WireConfig) -> Result<Self, WireError> {
        Ok(Self {
            codec: wire.codec()?,
            framing: wire.framing,
        })
    }

    /// Replace `local` with the contacts held by the server at `address`.
    ///
    /// On success every previous local contact is discarded and the remote
    /// records are inserted in the order received, skipping repeated names.
    /// Returns the number of contacts now in `local`.
    ///
    /// # Errors
    /// Any connect, send, or receive failure, or a reply other than
    /// `SYNC_READY` / `CONTACTS:...`, aborts the sync. `local` is left as it
    /// was in that case.
    ///
    /// # Example
    /// ```ignore
    /// let client = SyncClient::new(&WireConfig::default())?;
    /// let mut book = ContactBook::load("contacts.json")?;
    /// let count = client.sync_contacts("127.0.0.1:8080", &mut book).await?;
    /// ```
    pub async fn sync_contacts<S>(&self, address: &str, local: &mut S) -> Result<usize>
    where
        S: ContactStore + ?Sized,
    {
        let remote = self.fetch_contacts(address).await?;

        for existing in local.enumerate() {
            local.remove(&existing.name);
        }
        let mut inserted = 0;
        for contact in remote {
            if local.find_by_name(&contact.name).is_none() {
                local.insert(contact);
                inserted += 1;
            }
        }

        info!("✅ Synchronization completed: {} contact(s)", inserted);
        Ok(inserted)
    }

    /// Run the sync handshake and return the remote contacts without storing them.
    pub async fn fetch_contacts(&self, address: &str) -> Result<Vec<Contact>> {
        let mut conn = self.connect(address).await?;

        let ready = request(&mut conn, &Command::Sync.to_string(), "SYNC:").await?;
        if ready != SYNC_READY {
            return Err(SyncError::UnexpectedReply {
                request: "SYNC:",
                expected: SYNC_READY,
                actual: ready,
            }
            .into());
        }

        let listing = request(&mut conn, &Command::GetContacts.to_string(), "GET_CONTACTS").await?;
        let contacts = match Reply::parse(&listing) {
            Reply::Contacts(contacts) => contacts,
            _ => {
                return Err(SyncError::UnexpectedReply {
                    request: "GET_CONTACTS",
                    expected: CONTACTS_PREFIX,
                    actual: listing,
                }
                .into())
            }
        };

        close(conn).await;
        debug!("📇 Received {} contact(s) from {}", contacts.len(), address);
        Ok(contacts)
    }

    /// Send one `ADD_CONTACT:` to the server and return its reply.
    ///
    /// The contact is validated first so that nothing the server would
    /// misparse ever leaves this process.
    pub async fn add_contact(&self, address: &str, contact: &Contact) -> Result<Reply> {
        contact.validate().map_err(SyncError::from)?;

        let payload = contact.to_wire();
        let command = Command::AddContact(&payload).to_string();
        let mut conn = self.connect(address).await?;
        let reply = request(&mut conn, &command, "ADD_CONTACT:").await?;
        close(conn).await;

        Ok(Reply::parse(&reply))
    }

    /// Send arbitrary text as a single command and return the raw reply.
    pub async fn send_command(&self, address: &str, text: &str) -> Result<String> {
        let mut conn = self.connect(address).await?;
        let reply = request(&mut conn, text, "raw command").await?;
        close(conn).await;
        Ok(reply)
    }

    async fn connect(&self, address: &str) -> Result<Connection> {
        let stream = TcpStream::connect(address)
            .await
            .with_context(|| format!("failed to connect to server {}", address))?;
        info!("🔗 Connected to server {}", address);
        Ok(Connection::new(stream, self.codec.clone(), self.framing))
    }
}

/// Write one command and wait for exactly one reply.
async fn request(conn: &mut Connection, text: &str, label: &'static str) -> Result<String> {
    conn.write_message(text)
        .await
        .with_context(|| format!("failed to send {}", label))?;

    match conn
        .read_message()
        .await
        .with_context(|| format!("failed to receive reply to {}", label))?
    {
        Some(reply) => Ok(reply),
        None => Err(SyncError::ConnectionClosed { request: label }.into()),
    }
}

async fn close(mut conn: Connection) {
    if let Err(e) = conn.shutdown().await {
        debug!("Closing connection failed: {}", e);
    }
}
