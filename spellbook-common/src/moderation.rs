//! Moderation state machine for queued submissions
//!
//! `pending` is the only persisted state. Approval copies the submission into
//! the canonical catalog and deletes the queue entry; rejection just deletes
//! it. There is no edit transition: a submitter changes a queued record by
//! submitting it again.

use crate::import::Caller;
use crate::models::QueueEntry;
use crate::reconcile::{reconcile, Conflict};
use crate::record::Identity;
use crate::store::SpellStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// How approval treats the record currently in the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPolicy {
    /// Submission replaces whatever is canonical for its identity
    #[default]
    Overwrite,
    /// Submission is reconciled against the current canonical record first;
    /// conflicts leave the entry pending
    Reconcile,
}

impl FromStr for ApprovalPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "reconcile" => Ok(Self::Reconcile),
            other => Err(Error::Config(format!(
                "unknown approval policy {:?} (expected \"overwrite\" or \"reconcile\")",
                other
            ))),
        }
    }
}

impl fmt::Display for ApprovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => f.write_str("overwrite"),
            Self::Reconcile => f.write_str("reconcile"),
        }
    }
}

/// Result of an approval attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// Entry left the queue; the catalog holds it under `identity`
    Approved { identity: Identity },
    /// Entry is still pending because it conflicts with the catalog
    Conflicted {
        identity: Identity,
        conflicts: Vec<Conflict>,
    },
}

/// Approves and rejects moderation queue entries
pub struct ModerationService<'a> {
    store: &'a dyn SpellStore,
    policy: ApprovalPolicy,
}

impl<'a> ModerationService<'a> {
    pub fn new(store: &'a dyn SpellStore, policy: ApprovalPolicy) -> Self {
        Self { store, policy }
    }

    /// Look up a pending entry by identity
    pub async fn pending_entry(&self, identity: &Identity) -> Result<QueueEntry> {
        self.store
            .get_pending(identity)
            .await?
            .ok_or_else(|| Error::NotFound(format!("pending spell {}", identity)))
    }

    /// pending -> approved
    ///
    /// Strips queue metadata from the payload and upserts it under the
    /// identity of its current name, then removes the entry from the queue.
    pub async fn approve(&self, entry: &QueueEntry, caller: &Caller) -> Result<ApprovalOutcome> {
        caller.require_privilege("approving a spell")?;

        let mut record = entry.record.without_queue_metadata();
        let identity = record.identity().ok_or_else(|| {
            Error::InvalidInput(format!("pending spell {} has no name", entry.identity))
        })?;

        if self.policy == ApprovalPolicy::Reconcile {
            if let Some(current) = self.store.get(&identity).await? {
                let reconciliation = reconcile(&current, &record);
                if !reconciliation.is_clean() {
                    warn!(
                        "Approval of {} blocked by {} conflict(s) with the catalog",
                        identity,
                        reconciliation.conflicts.len()
                    );
                    return Ok(ApprovalOutcome::Conflicted {
                        identity,
                        conflicts: reconciliation.conflicts,
                    });
                }
                record = reconciliation.merged;
            }
        }

        self.store.promote(&entry.identity, &identity, &record).await?;

        info!(
            "Approved {} (submitted by {}) as {}",
            entry.identity, entry.submitted_by, identity
        );

        Ok(ApprovalOutcome::Approved { identity })
    }

    /// pending -> rejected; the submission is discarded
    pub async fn reject(&self, entry: &QueueEntry, caller: &Caller) -> Result<()> {
        caller.require_privilege("rejecting a spell")?;

        if !self.store.delete_pending(&entry.identity).await? {
            return Err(Error::NotFound(format!("pending spell {}", entry.identity)));
        }

        info!(
            "Rejected {} (submitted by {})",
            entry.identity, entry.submitted_by
        );

        Ok(())
    }

    /// Approve the entry pending under `identity`
    pub async fn approve_identity(
        &self,
        identity: &Identity,
        caller: &Caller,
    ) -> Result<ApprovalOutcome> {
        caller.require_privilege("approving a spell")?;
        let entry = self.pending_entry(identity).await?;
        self.approve(&entry, caller).await
    }

    /// Reject the entry pending under `identity`
    pub async fn reject_identity(&self, identity: &Identity, caller: &Caller) -> Result<()> {
        caller.require_privilege("rejecting a spell")?;
        let entry = self.pending_entry(identity).await?;
        self.reject(&entry, caller).await
    }
}
