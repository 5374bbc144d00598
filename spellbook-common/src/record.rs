//! Spell records and the identities derived from them
//!
//! A [`Record`] is a sparse, flat `field -> string` map. An empty value
//! carries no information and is treated exactly like an absent field.
//! The [`Identity`] of a record is derived from its name field and is the
//! de-duplication key for both the canonical catalog and the moderation queue.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Human-facing primary key of a spell record
pub const NAME_FIELD: &str = "Spell Name";

/// Keys that only exist on moderation queue payloads
pub const QUEUE_METADATA_FIELDS: [&str; 3] = ["id", "submittedBy", "status"];

/// Header aliases accepted from tabular imports, mapped to catalog field names
const HEADER_ALIASES: [(&str, &str); 3] = [
    ("Name", NAME_FIELD),
    ("Details", "Description"),
    ("Upcast", "Higher Level"),
];

// ============================================================================
// Identity
// ============================================================================

/// Normalized, stable key derived from a record's name
///
/// Lower-cased, trimmed, with every run of whitespace or `/` characters
/// replaced by a single `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Derive the identity for a human-readable name
    ///
    /// Callers filter out blank names before calling; a blank name yields an
    /// empty identity.
    pub fn of(name: &str) -> Self {
        let mut normalized = String::with_capacity(name.len());
        let mut in_separator = false;

        for ch in name.trim().chars() {
            if ch.is_whitespace() || ch == '/' {
                if !in_separator {
                    normalized.push('-');
                    in_separator = true;
                }
            } else {
                normalized.extend(ch.to_lowercase());
                in_separator = false;
            }
        }

        Self(normalized)
    }

    /// Wrap an identity that was already normalized (e.g. read from storage
    /// or taken from a URL path)
    pub fn from_normalized(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Record
// ============================================================================

/// Flat field -> string data describing one catalog item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from one row of tabular input
    ///
    /// Header names are trimmed and mapped through the import aliases
    /// (`Name`, `Details`, `Upcast`); empty cells are dropped.
    pub fn from_row<K, V, I>(row: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Self::new();
        for (header, value) in row {
            let header = header.as_ref().trim();
            let field = HEADER_ALIASES
                .iter()
                .find(|(alias, _)| *alias == header)
                .map(|(_, field)| *field)
                .unwrap_or(header);
            let value = value.into();
            if !field.is_empty() && !value.is_empty() {
                record.0.insert(field.to_string(), value);
            }
        }
        record
    }

    /// Builder-style setter, mostly for tests and fixtures
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Non-empty value of a field
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Name of the record, if it has a usable (non-blank) one
    pub fn name(&self) -> Option<&str> {
        self.get(NAME_FIELD).filter(|name| !name.trim().is_empty())
    }

    /// Identity derived from the name; `None` when the record has no usable name
    pub fn identity(&self) -> Option<Identity> {
        self.name().map(Identity::of)
    }

    /// All stored fields, including empty ones, in key order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of the record with moderation-only keys removed
    pub fn without_queue_metadata(&self) -> Self {
        let mut stripped = self.clone();
        for key in QUEUE_METADATA_FIELDS {
            stripped.0.remove(key);
        }
        stripped
    }
}

impl From<BTreeMap<String, String>> for Record {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
