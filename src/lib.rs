pub mod client;
pub mod common;
pub mod contacts;
pub mod server;

pub use client::SyncClient;
pub use contacts::{Contact, ContactBook, ContactStore};
pub use server::ContactServer;
