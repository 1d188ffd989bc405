//! # Server Components
//!
//! - [`server`]: lifecycle and the accept loop
//! - [`session`]: per-connection request loop
//! - [`protocol`]: command dispatch against a contact store
//! - [`registry`]: lock-guarded table of open connections
//! - [`config`]: TOML configuration

pub mod config;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use config::{ServerConfig, StoreMode};
pub use registry::{ClientRegistry, ConnectionId};
pub use server::ContactServer;
