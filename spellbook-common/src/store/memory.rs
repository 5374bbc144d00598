//! In-memory store implementation
//!
//! Suitable for tests and for running the service without a database file.
//! State is lost when the process exits.

use super::{Catalog, ModerationQueue, Personas, SpellStore};
use crate::models::{CatalogWrite, QueueEntry};
use crate::persona::{Persona, PersonaBook};
use crate::record::{Identity, Record};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Lock-guarded catalog, queue and persona maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: RwLock<BTreeMap<Identity, Record>>,
    queue: RwLock<BTreeMap<Identity, QueueEntry>>,
    personas: RwLock<PersonaBook>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with catalog records (keyed by their own identity)
    ///
    /// Records without a usable name are ignored.
    pub fn with_catalog(records: impl IntoIterator<Item = Record>) -> Self {
        let catalog = records
            .into_iter()
            .filter_map(|record| record.identity().map(|identity| (identity, record)))
            .collect();
        Self {
            catalog: RwLock::new(catalog),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn get(&self, identity: &Identity) -> Result<Option<Record>> {
        Ok(self.catalog.read().await.get(identity).cloned())
    }

    async fn get_all(&self) -> Result<BTreeMap<Identity, Record>> {
        Ok(self.catalog.read().await.clone())
    }

    async fn upsert(&self, identity: &Identity, record: &Record) -> Result<()> {
        self.catalog
            .write()
            .await
            .insert(identity.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, identity: &Identity) -> Result<bool> {
        Ok(self.catalog.write().await.remove(identity).is_some())
    }

    async fn apply(&self, writes: &[CatalogWrite]) -> Result<()> {
        let mut catalog = self.catalog.write().await;
        for write in writes {
            match write {
                CatalogWrite::Upsert { identity, record } => {
                    catalog.insert(identity.clone(), record.clone());
                }
                CatalogWrite::Delete { identity } => {
                    catalog.remove(identity);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ModerationQueue for MemoryStore {
    async fn list_pending(&self) -> Result<Vec<QueueEntry>> {
        let mut entries: Vec<QueueEntry> = self.queue.read().await.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        Ok(entries)
    }

    async fn get_pending(&self, identity: &Identity) -> Result<Option<QueueEntry>> {
        Ok(self.queue.read().await.get(identity).cloned())
    }

    async fn append_pending(&self, entry: &QueueEntry) -> Result<()> {
        self.queue
            .write()
            .await
            .insert(entry.identity.clone(), entry.clone());
        Ok(())
    }

    async fn delete_pending(&self, identity: &Identity) -> Result<bool> {
        Ok(self.queue.write().await.remove(identity).is_some())
    }

    async fn append_all(&self, entries: &[QueueEntry]) -> Result<()> {
        let mut queue = self.queue.write().await;
        for entry in entries {
            queue.insert(entry.identity.clone(), entry.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl Personas for MemoryStore {
    async fn list_personas(&self) -> Result<PersonaBook> {
        Ok(self.personas.read().await.clone())
    }

    async fn get_persona(&self, name: &str) -> Result<Option<Persona>> {
        Ok(self.personas.read().await.get(name).cloned())
    }

    async fn save_personas(&self, personas: &PersonaBook) -> Result<()> {
        let mut stored = self.personas.write().await;
        for (name, persona) in personas {
            stored.insert(name.clone(), persona.clone());
        }
        Ok(())
    }

    async fn delete_persona(&self, name: &str) -> Result<bool> {
        Ok(self.personas.write().await.remove(name).is_some())
    }
}

#[async_trait]
impl SpellStore for MemoryStore {
    async fn promote(
        &self,
        queue_identity: &Identity,
        identity: &Identity,
        record: &Record,
    ) -> Result<()> {
        // Lock order: catalog, then queue
        let mut catalog = self.catalog.write().await;
        let mut queue = self.queue.write().await;

        if queue.remove(queue_identity).is_none() {
            return Err(Error::NotFound(format!("pending spell {}", queue_identity)));
        }
        catalog.insert(identity.clone(), record.clone());
        Ok(())
    }
}
