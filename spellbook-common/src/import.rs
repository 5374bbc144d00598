//! Batch import of spell records
//!
//! Privileged callers write straight to the canonical catalog: new identities
//! are staged as-is, canonically equal records are skipped, and differing
//! records go through [`reconcile`]. Conflicting records stop the batch until
//! the [`DecisionMaker`] answers for that record. All staged records are
//! written at the end as one catalog batch.
//!
//! Everyone else goes through the moderation queue. Submissions are not
//! compared with the catalog at all; that happens at approval time.
//!
//! Two records of one batch with the same identity are merged within the
//! batch: the later one is reconciled against what was staged for the earlier
//! one, using the same conflict flow.

use crate::canonical::canonically_equal;
use crate::decision::DecisionMaker;
use crate::models::{CatalogWrite, QueueEntry, Submitter};
use crate::reconcile::{reconcile, Conflict};
use crate::record::{Identity, Record};
use crate::store::SpellStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Who is calling, as established by the authentication collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub submitter: Submitter,
    pub privileged: bool,
}

impl Caller {
    pub fn privileged(submitter: Submitter) -> Self {
        Self {
            submitter,
            privileged: true,
        }
    }

    pub fn unprivileged(submitter: Submitter) -> Self {
        Self {
            submitter,
            privileged: false,
        }
    }

    /// Fails with [`Error::Forbidden`] unless the caller is privileged
    pub fn require_privilege(&self, action: &str) -> Result<()> {
        if self.privileged {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "{} requires a privileged caller ({} is not)",
                action, self.submitter
            )))
        }
    }
}

/// Record left out of the write set because its conflicts were not accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedRecord {
    pub identity: Identity,
    pub conflicts: Vec<Conflict>,
}

/// Counts reported by [`ImportOrchestrator::import_batch`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Records written to the canonical catalog
    pub written: usize,
    /// Records equal to what the catalog already holds
    pub unchanged: usize,
    /// Records dropped for lack of a usable name
    pub skipped: usize,
    /// Conflicting records the decision-maker kept as they were
    pub unresolved: usize,
    /// Records appended to the moderation queue
    pub queued: usize,
    /// Records whose identity repeated an earlier record of the same batch
    pub batch_duplicates: usize,
    pub unresolved_records: Vec<UnresolvedRecord>,
}

impl ImportSummary {
    pub fn display_string(&self) -> String {
        if self.queued > 0 {
            format!("{} spells submitted for approval", self.queued)
        } else if self.written > 0 {
            format!("Import complete! {} spells were added or updated", self.written)
        } else {
            "Import complete. No new spells or changes were found to import".to_string()
        }
    }
}

/// Where the record a duplicate is compared against came from
enum Baseline {
    Catalog,
    Staged(usize),
}

/// Drives batches through identity resolution and reconciliation
pub struct ImportOrchestrator<'a> {
    store: &'a dyn SpellStore,
}

impl<'a> ImportOrchestrator<'a> {
    pub fn new(store: &'a dyn SpellStore) -> Self {
        Self { store }
    }

    /// Import a batch, writing directly for privileged callers and queueing
    /// for everyone else
    pub async fn import_batch(
        &self,
        records: Vec<Record>,
        caller: &Caller,
        decisions: &dyn DecisionMaker,
    ) -> Result<ImportSummary> {
        if caller.privileged {
            self.import_privileged(records, decisions).await
        } else {
            self.submit_for_approval(records, &caller.submitter).await
        }
    }

    /// Append every named record to the moderation queue as pending
    pub async fn submit_for_approval(
        &self,
        records: Vec<Record>,
        submitter: &Submitter,
    ) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        let named = filter_named(records, &mut summary);

        let mut entries: Vec<QueueEntry> = Vec::with_capacity(named.len());
        let mut positions: HashMap<Identity, usize> = HashMap::new();

        for (identity, record) in named {
            let entry = QueueEntry::pending(identity.clone(), record, submitter.clone());
            match positions.get(&identity) {
                Some(&position) => {
                    debug!("Later submission of {} replaces earlier one in batch", identity);
                    summary.batch_duplicates += 1;
                    entries[position] = entry;
                }
                None => {
                    positions.insert(identity, entries.len());
                    entries.push(entry);
                }
            }
        }

        self.store.append_all(&entries).await?;
        summary.queued = entries.len();

        info!(
            "Queued {} spell(s) for approval from {} (skipped {})",
            summary.queued, submitter, summary.skipped
        );

        Ok(summary)
    }

    async fn import_privileged(
        &self,
        records: Vec<Record>,
        decisions: &dyn DecisionMaker,
    ) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        let named = filter_named(records, &mut summary);

        // One snapshot for the whole batch
        let catalog = self.store.get_all().await?;

        let mut staged: Vec<(Identity, Record)> = Vec::new();
        let mut positions: HashMap<Identity, usize> = HashMap::new();
        let mut seen: HashSet<Identity> = HashSet::new();

        for (identity, incoming) in named {
            if !seen.insert(identity.clone()) {
                summary.batch_duplicates += 1;
            }

            let (baseline, existing) = match positions.get(&identity) {
                Some(&position) => (Baseline::Staged(position), &staged[position].1),
                None => match catalog.get(&identity) {
                    Some(existing) => (Baseline::Catalog, existing),
                    None => {
                        debug!("Staging new spell {}", identity);
                        positions.insert(identity.clone(), staged.len());
                        staged.push((identity, incoming));
                        continue;
                    }
                },
            };

            if canonically_equal(existing, &incoming) {
                debug!("{} is unchanged", identity);
                summary.unchanged += 1;
                continue;
            }

            let reconciliation = reconcile(existing, &incoming);
            let resolved = if reconciliation.is_clean() {
                reconciliation.merged
            } else {
                warn!(
                    "{} conflicts with existing data on {} field(s); awaiting decision",
                    identity,
                    reconciliation.conflicts.len()
                );

                let accepted = match decisions
                    .resolve_conflicts(existing, &incoming, &reconciliation.conflicts)
                    .await
                {
                    Some(resolution) => {
                        let resolved = reconciliation.apply(&resolution);
                        decisions
                            .confirm_replace(existing, &resolved)
                            .await
                            .then_some(resolved)
                    }
                    None => None,
                };

                match accepted {
                    Some(resolved) => resolved,
                    None => {
                        info!("Keeping existing {}", identity);
                        summary.unresolved += 1;
                        summary.unresolved_records.push(UnresolvedRecord {
                            identity,
                            conflicts: reconciliation.conflicts,
                        });
                        continue;
                    }
                }
            };

            if &resolved == existing {
                summary.unchanged += 1;
                continue;
            }

            match baseline {
                Baseline::Staged(position) => staged[position].1 = resolved,
                Baseline::Catalog => {
                    positions.insert(identity.clone(), staged.len());
                    staged.push((identity, resolved));
                }
            }
        }

        if !staged.is_empty() {
            let writes: Vec<CatalogWrite> = staged
                .into_iter()
                .map(|(identity, record)| CatalogWrite::Upsert { identity, record })
                .collect();
            self.store.apply(&writes).await?;
            summary.written = writes.len();
        }

        info!(
            "Privileged import: {} written, {} unchanged, {} unresolved, {} skipped",
            summary.written, summary.unchanged, summary.unresolved, summary.skipped
        );

        Ok(summary)
    }

    /// Replace a catalog record, optionally renaming it
    ///
    /// When `prior` names a different identity than the record's current name,
    /// the prior entry is deleted in the same logical batch.
    pub async fn edit_record(
        &self,
        prior: Option<&Identity>,
        record: Record,
        caller: &Caller,
    ) -> Result<Identity> {
        caller.require_privilege("editing a spell")?;

        let identity = record
            .identity()
            .ok_or_else(|| Error::InvalidInput("spell has no name".to_string()))?;

        let mut writes = Vec::with_capacity(2);
        if let Some(prior) = prior.filter(|prior| **prior != identity) {
            if self.store.get(&identity).await?.is_some() {
                warn!("Renaming {} to {} overwrites the existing {}", prior, identity, identity);
            }
            writes.push(CatalogWrite::Delete {
                identity: prior.clone(),
            });
        }
        writes.push(CatalogWrite::Upsert {
            identity: identity.clone(),
            record: record.without_queue_metadata(),
        });

        self.store.apply(&writes).await?;
        info!("Saved spell {}", identity);

        Ok(identity)
    }

    /// Remove a record from the canonical catalog
    pub async fn delete_record(&self, identity: &Identity, caller: &Caller) -> Result<()> {
        caller.require_privilege("deleting a spell")?;

        if !self.store.delete(identity).await? {
            return Err(Error::NotFound(format!("spell {}", identity)));
        }
        info!("Deleted spell {}", identity);

        Ok(())
    }
}

/// Drop records without a usable name, counting them as skipped
///
/// Queue-only metadata keys never travel with an imported record.
fn filter_named(records: Vec<Record>, summary: &mut ImportSummary) -> Vec<(Identity, Record)> {
    records
        .into_iter()
        .filter_map(|record| match record.identity() {
            Some(identity) => Some((identity, record.without_queue_metadata())),
            None => {
                warn!("Skipping record without a spell name");
                summary.skipped += 1;
                None
            }
        })
        .collect()
}
