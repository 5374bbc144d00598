//! Moderation queue and catalog write models

use crate::record::{Identity, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stored marker for submissions without a known submitter
pub const ANONYMOUS_SUBMITTER: &str = "public_submission";

/// Who submitted a queued record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Submitter {
    Anonymous,
    Named(String),
}

impl Submitter {
    /// Submitter from an optional identity; blank identities are anonymous
    pub fn from_optional(identity: Option<&str>) -> Self {
        match identity.map(str::trim) {
            Some(name) if !name.is_empty() && name != ANONYMOUS_SUBMITTER => {
                Self::Named(name.to_string())
            }
            _ => Self::Anonymous,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Anonymous => ANONYMOUS_SUBMITTER,
            Self::Named(name) => name,
        }
    }
}

impl From<String> for Submitter {
    fn from(value: String) -> Self {
        Self::from_optional(Some(&value))
    }
}

impl From<Submitter> for String {
    fn from(value: Submitter) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Submitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted moderation status
///
/// `Pending` is the only state ever stored: approval and rejection delete
/// the queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
        }
    }
}

/// A submission awaiting approval or rejection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub identity: Identity,
    pub submission_id: Uuid,
    pub record: Record,
    pub submitted_by: Submitter,
    pub status: ModerationStatus,
    pub submitted_at: DateTime<Utc>,
}

impl QueueEntry {
    /// New pending entry for a record that has a usable name
    pub fn pending(identity: Identity, record: Record, submitted_by: Submitter) -> Self {
        Self {
            identity,
            submission_id: Uuid::new_v4(),
            record,
            submitted_by,
            status: ModerationStatus::Pending,
            submitted_at: Utc::now(),
        }
    }
}

/// One write in a logical catalog batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogWrite {
    Upsert { identity: Identity, record: Record },
    Delete { identity: Identity },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitter_sentinel_round_trips() {
        assert_eq!(Submitter::from_optional(None), Submitter::Anonymous);
        assert_eq!(Submitter::from_optional(Some("  ")), Submitter::Anonymous);
        assert_eq!(Submitter::from(ANONYMOUS_SUBMITTER.to_string()), Submitter::Anonymous);
        assert_eq!(Submitter::Anonymous.as_str(), "public_submission");
        assert_eq!(
            Submitter::from_optional(Some("alice")),
            Submitter::Named("alice".to_string())
        );
    }

    #[test]
    fn test_queue_entry_serializes_with_metadata() {
        let entry = QueueEntry::pending(
            Identity::of("Mage Armor"),
            Record::new().with("Spell Name", "Mage Armor"),
            Submitter::Named("alice".to_string()),
        );

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["identity"], "mage-armor");
        assert_eq!(json["submittedBy"], "alice");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["record"]["Spell Name"], "Mage Armor");
    }
}
