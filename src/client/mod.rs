//! # Client Components
//!
//! ## Sync Client ([`client`])
//! Connects to a server, runs the `SYNC:` / `GET_CONTACTS` exchange and
//! replaces a local contact store with the result. Also pushes single
//! contacts and raw commands.
//!
//! ## Configuration ([`config`])
//! Target server and local contact file, loaded from TOML.

pub mod client;
pub mod config;

// Re-export for convenience
pub use client::{SyncClient, SyncError};
pub use config::ClientConfig;
