//! # Message Protocol
//!
//! Text commands sent by clients and the replies the server returns.
//!
//! ```text
//! ADD_CONTACT:name,phone,email  ->  Contact added: name   (or: Invalid contact format,
//!                                                          Contact list full)
//! GET_CONTACTS                  ->  CONTACTS:n,p,e|n,p,e|...   (or: Contact list too large)
//! SYNC:                         ->  SYNC_READY
//! anything else                 ->  Unknown command
//! ```
//!
//! Prefixes are matched exactly and case-sensitively, in the order above.

use std::fmt;

use crate::contacts::contact::RECORD_SEPARATOR;
use crate::contacts::Contact;

pub const ADD_CONTACT_PREFIX: &str = "ADD_CONTACT:";
pub const GET_CONTACTS: &str = "GET_CONTACTS";
pub const SYNC_PREFIX: &str = "SYNC:";

pub const CONTACT_ADDED_PREFIX: &str = "Contact added: ";
pub const CONTACTS_PREFIX: &str = "CONTACTS:";
pub const SYNC_READY: &str = "SYNC_READY";
pub const INVALID_CONTACT_FORMAT: &str = "Invalid contact format";
pub const UNKNOWN_COMMAND: &str = "Unknown command";
pub const CONTACT_LIST_FULL: &str = "Contact list full";
pub const CONTACT_LIST_TOO_LARGE: &str = "Contact list too large";

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `ADD_CONTACT:` followed by the raw, still unparsed payload
    AddContact(&'a str),
    GetContacts,
    /// `SYNC:` plus whatever followed it, which is ignored
    Sync,
    /// Any text that matched no prefix
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(text: &'a str) -> Self {
        if let Some(payload) = text.strip_prefix(ADD_CONTACT_PREFIX) {
            Command::AddContact(payload)
        } else if text.starts_with(GET_CONTACTS) {
            Command::GetContacts
        } else if text.starts_with(SYNC_PREFIX) {
            Command::Sync
        } else {
            Command::Unknown(text)
        }
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::AddContact(payload) => write!(f, "{}{}", ADD_CONTACT_PREFIX, payload),
            Command::GetContacts => f.write_str(GET_CONTACTS),
            Command::Sync => f.write_str(SYNC_PREFIX),
            Command::Unknown(text) => f.write_str(text),
        }
    }
}

/// A server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    ContactAdded(String),
    Contacts(Vec<Contact>),
    SyncReady,
    InvalidContactFormat,
    UnknownCommand,
    /// The store is at capacity and the name is not already present
    ContactListFull,
    /// The listing does not fit in one frame
    ContactListTooLarge,
    /// Text that is not a recognised reply
    Other(String),
}

impl Reply {
    /// Interpret a decoded reply.
    ///
    /// `CONTACTS:` payloads are split on `|`; empty segments and records that
    /// do not scan as `name,phone,email` are skipped.
    pub fn parse(text: &str) -> Self {
        if text == SYNC_READY {
            Reply::SyncReady
        } else if let Some(records) = text.strip_prefix(CONTACTS_PREFIX) {
            Reply::Contacts(parse_records(records))
        } else if let Some(name) = text.strip_prefix(CONTACT_ADDED_PREFIX) {
            Reply::ContactAdded(name.to_string())
        } else if text == INVALID_CONTACT_FORMAT {
            Reply::InvalidContactFormat
        } else if text == UNKNOWN_COMMAND {
            Reply::UnknownCommand
        } else if text == CONTACT_LIST_FULL {
            Reply::ContactListFull
        } else if text == CONTACT_LIST_TOO_LARGE {
            Reply::ContactListTooLarge
        } else {
            Reply::Other(text.to_string())
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::ContactAdded(name) => write!(f, "{}{}", CONTACT_ADDED_PREFIX, name),
            Reply::Contacts(contacts) => {
                f.write_str(CONTACTS_PREFIX)?;
                for (i, contact) in contacts.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", RECORD_SEPARATOR)?;
                    }
                    write!(f, "{}", contact)?;
                }
                Ok(())
            }
            Reply::SyncReady => f.write_str(SYNC_READY),
            Reply::InvalidContactFormat => f.write_str(INVALID_CONTACT_FORMAT),
            Reply::UnknownCommand => f.write_str(UNKNOWN_COMMAND),
            Reply::ContactListFull => f.write_str(CONTACT_LIST_FULL),
            Reply::ContactListTooLarge => f.write_str(CONTACT_LIST_TOO_LARGE),
            Reply::Other(text) => f.write_str(text),
        }
    }
}

fn parse_records(records: &str) -> Vec<Contact> {
    records
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.is_empty())
        .filter_map(Contact::from_wire)
        .collect()
}
