//! Contact records and their comma-separated wire form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest accepted name, in UTF-8 bytes.
pub const MAX_NAME_LEN: usize = 49;
/// Longest accepted phone number, in UTF-8 bytes.
pub const MAX_PHONE_LEN: usize = 19;
/// Longest accepted email, in UTF-8 bytes.
pub const MAX_EMAIL_LEN: usize = 49;
/// Longest `name,phone,email` record.
pub const MAX_RECORD_LEN: usize = MAX_NAME_LEN + MAX_PHONE_LEN + MAX_EMAIL_LEN + 2;

/// Separator between the fields of one record.
pub const FIELD_SEPARATOR: char = ',';
/// Separator between records in a `CONTACTS:` reply.
pub const RECORD_SEPARATOR: char = '|';

/// Reasons a contact cannot be sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} exceeds {max} bytes")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} contains a reserved character: {found:?}")]
    ReservedChar { field: &'static str, found: char },
}

/// A single address-book entry. The name is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl Contact {
    /// Build a contact, checking that it survives a trip through the wire format.
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, ContactError> {
        let contact = Self {
            name: name.into(),
            phone: phone.into(),
            email: email.into(),
        };
        contact.validate()?;
        Ok(contact)
    }

    /// Check field bounds and reserved characters.
    ///
    /// Names and phones may not contain `,` or `|`; emails may additionally
    /// not contain whitespace, since the email field ends at the first blank.
    pub fn validate(&self) -> Result<(), ContactError> {
        check_field("name", &self.name, MAX_NAME_LEN, |c| {
            c == FIELD_SEPARATOR || c == RECORD_SEPARATOR
        })?;
        check_field("phone", &self.phone, MAX_PHONE_LEN, |c| {
            c == FIELD_SEPARATOR || c == RECORD_SEPARATOR
        })?;
        check_field("email", &self.email, MAX_EMAIL_LEN, |c| {
            c == FIELD_SEPARATOR || c == RECORD_SEPARATOR || c.is_whitespace()
        })?;
        Ok(())
    }

    /// Parse `name,phone,email`.
    ///
    /// The rules follow a `%49[^,],%19[^,],%49s` scan, with lengths in bytes:
    /// - name is 1..=49 bytes up to the first comma
    /// - phone is 1..=19 bytes up to the next comma
    /// - email skips leading whitespace, runs to the next whitespace and is
    ///   cut at 49 bytes (backing off to a character boundary); anything
    ///   after it is ignored
    ///
    /// Returns `None` when any field is missing or a bounded field overruns
    /// its limit before reaching its comma.
    pub fn from_wire(record: &str) -> Option<Self> {
        let (name, rest) = scan_until_comma(record, MAX_NAME_LEN)?;
        let (phone, rest) = scan_until_comma(rest, MAX_PHONE_LEN)?;

        let token = rest.trim_start();
        let token = &token[..token.find(char::is_whitespace).unwrap_or(token.len())];
        let email = truncate_to_boundary(token, MAX_EMAIL_LEN);
        if email.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
        })
    }

    /// Render as `name,phone,email`.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.name,
            self.phone,
            self.email,
            sep = FIELD_SEPARATOR
        )
    }
}

/// Take up to `max` bytes before a comma, then consume the comma.
fn scan_until_comma(input: &str, max: usize) -> Option<(&str, &str)> {
    let end = input.find(FIELD_SEPARATOR)?;
    let field = &input[..end];
    if field.is_empty() || field.len() > max {
        return None;
    }
    Some((field, &input[end + FIELD_SEPARATOR.len_utf8()..]))
}

fn truncate_to_boundary(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn check_field(
    field: &'static str,
    value: &str,
    max: usize,
    reserved: impl Fn(char) -> bool,
) -> Result<(), ContactError> {
    if value.is_empty() {
        return Err(ContactError::Empty { field });
    }
    if value.len() > max {
        return Err(ContactError::TooLong { field, max });
    }
    if let Some(found) = value.chars().find(|c| reserved(*c)) {
        return Err(ContactError::ReservedChar { field, found });
    }
    Ok(())
}
