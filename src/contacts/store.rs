//! Contact storage behind the [`ContactStore`] trait.
//!
//! The network layer only ever talks to the trait. [`ContactBook`] is the
//! plain in-memory implementation; [`SharedContactBook`] puts one book behind
//! a mutex so several sessions can use it at once.

use anyhow::{Context, Result};
use log::info;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::contact::Contact;

/// Operations the protocol layer needs from a contact store.
pub trait ContactStore {
    /// Add a contact. A contact with the same name is replaced in place.
    fn insert(&mut self, contact: Contact);

    fn find_by_name(&self, name: &str) -> Option<Contact>;

    /// All contacts in insertion order.
    fn enumerate(&self) -> Vec<Contact>;

    /// Remove by name. Returns `false` if no such contact existed.
    fn remove(&mut self, name: &str) -> bool;

    fn len(&self) -> usize {
        self.enumerate().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Insertion-ordered in-memory contact list.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ContactBook {
    contacts: Vec<Contact>,
}

impl ContactBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a book from records, dropping later duplicates of a name.
    pub fn from_contacts(contacts: impl IntoIterator<Item = Contact>) -> Self {
        let mut book = Self::new();
        for contact in contacts {
            if book.position(&contact.name).is_none() {
                book.contacts.push(contact);
            }
        }
        book
    }

    /// Overwrite the record stored under `name`.
    ///
    /// Returns `false` if `name` is unknown. The replacement may carry a new
    /// name; if that name belongs to another record, the other record is
    /// dropped so names stay unique.
    pub fn update(&mut self, name: &str, contact: Contact) -> bool {
        let Some(index) = self.position(name) else {
            return false;
        };
        if contact.name != name {
            if let Some(clash) = self.position(&contact.name) {
                self.contacts.remove(clash);
                let index = if clash < index { index - 1 } else { index };
                self.contacts[index] = contact;
                return true;
            }
        }
        self.contacts[index] = contact;
        true
    }

    /// Swap the whole content for `contacts`.
    pub fn replace_all(&mut self, contacts: impl IntoIterator<Item = Contact>) {
        *self = Self::from_contacts(contacts);
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter()
    }

    /// Load a book from a JSON file. A missing file yields an empty book.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(
                "📭 No existing contact file at {}. Starting with empty list",
                path.display()
            );
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read contacts from {}", path.display()))?;
        let contacts: Vec<Contact> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse contacts in {}", path.display()))?;
        Ok(Self::from_contacts(contacts))
    }

    /// Write the book to a JSON file, replacing any previous content.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write contacts to {}", path.display()))?;
        info!("💾 Saved {} contacts to {}", self.len(), path.display());
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.contacts.iter().position(|c| c.name == name)
    }
}

impl ContactStore for ContactBook {
    fn insert(&mut self, contact: Contact) {
        match self.position(&contact.name) {
            Some(index) => self.contacts[index] = contact,
            None => self.contacts.push(contact),
        }
    }

    fn find_by_name(&self, name: &str) -> Option<Contact> {
        self.contacts.iter().find(|c| c.name == name).cloned()
    }

    fn enumerate(&self) -> Vec<Contact> {
        self.contacts.clone()
    }

    fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.contacts.remove(index);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.contacts.len()
    }
}

/// A [`ContactBook`] shared between sessions.
///
/// Cloning yields another handle to the same book. Each trait call takes the
/// lock once and releases it before returning.
#[derive(Debug, Clone, Default)]
pub struct SharedContactBook {
    inner: Arc<Mutex<ContactBook>>,
}

impl SharedContactBook {
    pub fn new(book: ContactBook) -> Self {
        Self {
            inner: Arc::new(Mutex::new(book)),
        }
    }

    /// Copy of the current content.
    pub fn snapshot(&self) -> ContactBook {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, ContactBook> {
        // A panic while holding the lock cannot leave the Vec half-written
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContactStore for SharedContactBook {
    fn insert(&mut self, contact: Contact) {
        self.lock().insert(contact);
    }

    fn find_by_name(&self, name: &str) -> Option<Contact> {
        self.lock().find_by_name(name)
    }

    fn enumerate(&self) -> Vec<Contact> {
        self.lock().enumerate()
    }

    fn remove(&mut self, name: &str) -> bool {
        self.lock().remove(name)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
