//! Canonical projection of spell records
//!
//! Two records are considered equal for import purposes when their
//! projections onto the significant fields serialize identically. The field
//! order below is part of the comparison contract: adding a field changes the
//! outcome for records that previously compared equal, so every change bumps
//! [`CANONICAL_FIELDS_VERSION`] and must be called out in release notes.

use crate::record::{Record, NAME_FIELD};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Version of the significant field list
pub const CANONICAL_FIELDS_VERSION: u32 = 2;

/// Significant fields, in projection order
pub const CANONICAL_FIELDS: [&str; 10] = [
    NAME_FIELD,
    "Level",
    "School",
    "Casting Time",
    "Range",
    "Components",
    "Duration",
    "Description",
    "Higher Level",
    "Source",
];

/// Ordered subset of a record's non-empty significant fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalProjection<'a> {
    fields: Vec<(&'static str, &'a str)>,
}

impl<'a> CanonicalProjection<'a> {
    /// Project a record onto the significant fields, skipping empty ones
    pub fn of(record: &'a Record) -> Self {
        let fields = CANONICAL_FIELDS
            .iter()
            .filter_map(|field| record.get(field).map(|value| (*field, value)))
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[(&'static str, &'a str)] {
        &self.fields
    }

    /// Stable JSON serialization (an object with keys in projection order)
    pub fn to_json(&self) -> String {
        // Serializing a list of string pairs cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Serialize for CanonicalProjection<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, value) in &self.fields {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

/// True when both records carry the same significant content
pub fn canonically_equal(a: &Record, b: &Record) -> bool {
    CanonicalProjection::of(a).to_json() == CanonicalProjection::of(b).to_json()
}
