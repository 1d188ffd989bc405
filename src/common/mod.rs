//! # Common Components
//!
//! Shared utilities and data structures used by both client and server components.
//!
//! ## Modules
//!
//! - [`codec`]: Repeating-key XOR transform applied to all wire traffic
//! - [`connection`]: TCP connection abstraction with message framing
//! - [`messages`]: Command and reply definitions for the text protocol
//! - [`config`]: Configuration parsing utilities

pub mod codec;
pub mod config;
pub mod connection;
pub mod messages;
