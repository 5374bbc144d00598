//! Field-by-field reconciliation of an existing canonical record with an
//! incoming one
//!
//! Every field in the union of both records is classified as:
//! - unchanged: equal values, or empty on the incoming side
//! - fillable: empty on the existing side, non-empty incoming
//! - conflicting: both non-empty and unequal
//!
//! Conflicts keep the existing value until an external decision selects a
//! side for them. The name field is never touched: identity is immutable once
//! assigned. Nothing here writes anywhere; callers apply the returned record
//! atomically or not at all.

use crate::record::{Record, NAME_FIELD};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One field where both records hold non-empty, unequal values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub field: String,
    pub existing_value: String,
    pub incoming_value: String,
}

/// Which side wins for a conflicting field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldChoice {
    Existing,
    Incoming,
}

/// Decision for each conflicting field, keyed by field name
pub type Resolution = BTreeMap<String, FieldChoice>;

/// Outcome of [`reconcile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Existing record with fillable fields filled; conflicts keep the existing value
    pub merged: Record,
    pub conflicts: Vec<Conflict>,
}

impl Reconciliation {
    /// True when the merge needs no external decision
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Merged record with the given per-field choices applied
    ///
    /// Conflicting fields missing from `resolution` keep the existing value.
    pub fn apply(&self, resolution: &Resolution) -> Record {
        let mut resolved = self.merged.clone();
        for conflict in &self.conflicts {
            if resolution.get(&conflict.field) == Some(&FieldChoice::Incoming) {
                resolved.set(conflict.field.clone(), conflict.incoming_value.clone());
            }
        }
        resolved
    }

    /// Resolution choosing the same side for every conflict
    pub fn uniform_resolution(&self, choice: FieldChoice) -> Resolution {
        self.conflicts
            .iter()
            .map(|conflict| (conflict.field.clone(), choice))
            .collect()
    }
}

/// Compare `existing` against `incoming` field by field
pub fn reconcile(existing: &Record, incoming: &Record) -> Reconciliation {
    let mut merged = existing.clone();
    let mut conflicts = Vec::new();

    let fields: BTreeSet<&str> = existing.keys().chain(incoming.keys()).collect();

    for field in fields {
        if field == NAME_FIELD {
            continue;
        }

        match (existing.get(field), incoming.get(field)) {
            (None, Some(incoming_value)) => {
                merged.set(field, incoming_value);
            }
            (Some(existing_value), Some(incoming_value)) if existing_value != incoming_value => {
                conflicts.push(Conflict {
                    field: field.to_string(),
                    existing_value: existing_value.to_string(),
                    incoming_value: incoming_value.to_string(),
                });
            }
            _ => {}
        }
    }

    debug!(
        "Reconciled {:?}: {} conflict(s)",
        existing.name().unwrap_or_default(),
        conflicts.len()
    );

    Reconciliation { merged, conflicts }
}
