use serde::{Deserialize, Serialize};

use crate::common::config::{validate_port, WireConfig, DEFAULT_PORT};

/// Client configuration loaded from a TOML file.
///
/// # Example TOML
///
/// ```toml
/// [client]
/// server_address = "127.0.0.1"
/// server_port = 8080
/// contacts_file = "user-data/contacts.json"
///
/// [wire]
/// framing = "framed"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client: ClientInfo,
    pub wire: WireConfig,
}

/// Which server to talk to and where the local contacts live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    /// Host name or IP of the server
    pub server_address: String,
    /// Server port; values outside 1024..=65535 fall back to the default
    pub server_port: i64,
    /// Local contact file replaced by a successful sync
    pub contacts_file: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1".to_string(),
            server_port: i64::from(DEFAULT_PORT),
            contacts_file: "user-data/contacts.json".to_string(),
        }
    }
}

impl ClientConfig {
    /// `host:port` of the target server, with the port range enforced.
    pub fn server_target(&self) -> String {
        format!(
            "{}:{}",
            self.client.server_address,
            validate_port(self.client.server_port)
        )
    }
}
