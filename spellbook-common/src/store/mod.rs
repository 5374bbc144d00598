//! Pluggable storage for the canonical catalog, the moderation queue and
//! player personas
//!
//! The core performs no locking of its own. Mutual exclusion between
//! concurrent callers is delegated to the implementations below, which must
//! guarantee per-identity uniqueness in both collections.
//!
//! - [`MemoryStore`]: lock-guarded maps, for tests and ephemeral runs
//! - [`SqliteStore`]: sqlx-backed, batch writes and promotions in one transaction

pub mod memory;
#[cfg(feature = "sqlx")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlx")]
pub use sqlite::SqliteStore;

use crate::models::{CatalogWrite, QueueEntry};
use crate::persona::{Persona, PersonaBook};
use crate::record::{Identity, Record};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Authoritative store of approved records keyed by identity
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Gets the record stored under `identity`, if any
    async fn get(&self, identity: &Identity) -> Result<Option<Record>>;

    /// Snapshot of the whole catalog
    async fn get_all(&self) -> Result<BTreeMap<Identity, Record>>;

    /// Inserts or replaces the record stored under `identity`
    async fn upsert(&self, identity: &Identity, record: &Record) -> Result<()>;

    /// Removes the record stored under `identity`; returns whether one existed
    async fn delete(&self, identity: &Identity) -> Result<bool>;

    /// Applies a batch of writes as one logical unit
    ///
    /// The default applies writes in order and stops at the first failure;
    /// writes already applied stay applied. Transactional stores override it.
    async fn apply(&self, writes: &[CatalogWrite]) -> Result<()> {
        for write in writes {
            match write {
                CatalogWrite::Upsert { identity, record } => self.upsert(identity, record).await?,
                CatalogWrite::Delete { identity } => {
                    self.delete(identity).await?;
                }
            }
        }
        Ok(())
    }
}

/// Holding area for unprivileged submissions
#[async_trait]
pub trait ModerationQueue: Send + Sync {
    /// All pending entries, oldest submission first
    async fn list_pending(&self) -> Result<Vec<QueueEntry>>;

    async fn get_pending(&self, identity: &Identity) -> Result<Option<QueueEntry>>;

    /// Adds an entry; an entry already pending under the same identity is replaced
    async fn append_pending(&self, entry: &QueueEntry) -> Result<()>;

    /// Removes an entry; returns whether one existed
    async fn delete_pending(&self, identity: &Identity) -> Result<bool>;

    /// Adds a batch of entries as one logical unit
    ///
    /// The default appends in order and stops at the first failure; entries
    /// already appended stay queued. Transactional stores override it.
    async fn append_all(&self, entries: &[QueueEntry]) -> Result<()> {
        for entry in entries {
            self.append_pending(entry).await?;
        }
        Ok(())
    }
}

/// Player personas keyed by persona name
#[async_trait]
pub trait Personas: Send + Sync {
    async fn list_personas(&self) -> Result<PersonaBook>;

    async fn get_persona(&self, name: &str) -> Result<Option<Persona>>;

    /// Inserts or replaces every persona in `personas` as one write
    async fn save_personas(&self, personas: &PersonaBook) -> Result<()>;

    /// Removes a persona; returns whether one existed
    async fn delete_persona(&self, name: &str) -> Result<bool>;
}

/// Catalog, queue and personas behind one backend
#[async_trait]
pub trait SpellStore: Catalog + ModerationQueue + Personas {
    /// Writes `record` to the catalog under `identity` and removes the queue
    /// entry `queue_identity`
    ///
    /// Fails with [`Error::NotFound`] when the queue entry is gone. The default
    /// orders the queue delete after a confirmed catalog write, so a failure
    /// part-way leaves the entry pending and re-approvable.
    async fn promote(
        &self,
        queue_identity: &Identity,
        identity: &Identity,
        record: &Record,
    ) -> Result<()> {
        if self.get_pending(queue_identity).await?.is_none() {
            return Err(Error::NotFound(format!("pending spell {}", queue_identity)));
        }
        self.upsert(identity, record).await?;
        self.delete_pending(queue_identity).await?;
        Ok(())
    }
}
