//! # Contacts
//!
//! The contact record type, its wire form, and the stores the protocol layer
//! reads and writes.

pub mod contact;
pub mod store;

pub use contact::{Contact, ContactError};
pub use store::{ContactBook, ContactStore, SharedContactBook};
