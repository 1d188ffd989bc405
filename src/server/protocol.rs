//! # Command Dispatch
//!
//! Maps one decoded command onto a contact store and produces the reply.
//! Dispatch holds no state of its own and never blocks: protocol errors become
//! reply strings and the session carries on.

use log::{debug, warn};

use crate::common::connection::MAX_FRAME_SIZE;
use crate::common::messages::{Command, Reply, CONTACTS_PREFIX};
use crate::contacts::contact::MAX_RECORD_LEN;
use crate::contacts::{Contact, ContactStore};

/// Most contacts a store may hold through `ADD_CONTACT:`. A full listing of
/// maximum-length records still fits in one frame.
pub const MAX_CONTACTS: usize = 500;

const _: () = assert!(CONTACTS_PREFIX.len() + MAX_CONTACTS * (MAX_RECORD_LEN + 1) <= MAX_FRAME_SIZE);

/// Apply `text` to `store` and return the reply to send back.
///
/// # Example
/// ```ignore
/// let mut book = ContactBook::new();
/// let reply = dispatch(&mut book, "ADD_CONTACT:Alice,555,alice@x.com");
/// assert_eq!(reply.to_string(), "Contact added: Alice");
/// ```
pub fn dispatch<S>(store: &mut S, text: &str) -> Reply
where
    S: ContactStore + ?Sized,
{
    match Command::parse(text) {
        Command::AddContact(payload) => match Contact::from_wire(payload) {
            Some(contact)
                if store.len() >= MAX_CONTACTS && store.find_by_name(&contact.name).is_none() =>
            {
                warn!("⚠️  Store full, rejected contact '{}'", contact.name);
                Reply::ContactListFull
            }
            Some(contact) => {
                let name = contact.name.clone();
                store.insert(contact);
                debug!("➕ Added contact '{}'", name);
                Reply::ContactAdded(name)
            }
            None => {
                debug!("⚠️  Rejected contact payload {:?}", payload);
                Reply::InvalidContactFormat
            }
        },
        Command::GetContacts => Reply::Contacts(store.enumerate()),
        Command::Sync => Reply::SyncReady,
        Command::Unknown(_) => Reply::UnknownCommand,
    }
}
