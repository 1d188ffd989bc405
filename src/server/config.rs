use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use crate::common::config::{validate_port, WireConfig, DEFAULT_PORT};

/// Complete server configuration loaded from a TOML file.
///
/// # Example TOML
///
/// ```toml
/// [server]
/// bind_address = "0.0.0.0"
/// port = 8080
///
/// [wire]
/// key = "echonull_secure_key_2024"
/// framing = "framed"
///
/// [store]
/// mode = "per_session"
/// contacts_file = "user-data/server_contacts.json"
/// save_on_shutdown = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerInfo,
    pub wire: WireConfig,
    pub store: StoreConfig,
}

/// Where this server listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    /// Interface to bind (e.g., "0.0.0.0" or "127.0.0.1")
    pub bind_address: String,
    /// Listening port; values outside 1024..=65535 fall back to the default
    pub port: i64,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: i64::from(DEFAULT_PORT),
        }
    }
}

/// Which store each session dispatches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// Every session starts from its own copy of the seed contacts. Additions
    /// are invisible to other sessions and vanish when the session ends.
    #[default]
    PerSession,
    /// All sessions read and write one lock-guarded store.
    Shared,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub mode: StoreMode,
    /// JSON file holding the seed contacts
    pub contacts_file: Option<String>,
    /// Write the shared store back to `contacts_file` when the server stops.
    /// Ignored in per-session mode.
    pub save_on_shutdown: bool,
}

impl ServerConfig {
    /// Socket address to bind, with the port range enforced.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .with_context(|| format!("invalid bind address {}", self.server.bind_address))?;
        Ok(SocketAddr::new(ip, validate_port(self.server.port)))
    }
}
