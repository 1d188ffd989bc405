//! # Configuration Utilities
//!
//! Shared configuration structures and parsing utilities used by both
//! client and server components.

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;

use super::codec::{XorCodec, DEFAULT_KEY};
use super::connection::WireError;

/// Port used when none is configured or the configured one is out of range.
pub const DEFAULT_PORT: u16 = 8080;

/// Lowest port accepted from configuration. Privileged ports are refused.
pub const MIN_PORT: u16 = 1024;

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Example
/// ```ignore
/// let config: ServerConfig = load_config("config/server.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read config {}", path))?;
    let config: T =
        toml::from_str(&content).with_context(|| format!("failed to parse config {}", path))?;
    Ok(config)
}

/// Check a configured port against `1024..=65535`.
///
/// Out-of-range values (including 0 and negatives) are replaced by
/// [`DEFAULT_PORT`] and a warning is logged.
pub fn validate_port(port: i64) -> u16 {
    match u16::try_from(port) {
        Ok(port) if port >= MIN_PORT => port,
        _ => {
            warn!(
                "⚠️  Invalid port number {}. Using default port {}",
                port, DEFAULT_PORT
            );
            DEFAULT_PORT
        }
    }
}

/// How messages are delimited on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// 4-byte big-endian length prefix before every message.
    #[default]
    Framed,
    /// No delimiter: each read is taken as one whole message.
    Legacy,
}

/// Settings both ends of a connection must agree on.
///
/// # Example TOML
///
/// ```toml
/// [wire]
/// key = "echonull_secure_key_2024"
/// framing = "framed"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Shared XOR key
    pub key: String,
    /// Message delimiting mode
    pub framing: Framing,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            framing: Framing::default(),
        }
    }
}

impl WireConfig {
    /// Build the codec described by this configuration.
    pub fn codec(&self) -> Result<XorCodec, WireError> {
        XorCodec::new(self.key.as_bytes())
    }
}
