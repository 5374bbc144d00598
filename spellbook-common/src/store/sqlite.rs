//! SQLite-backed store
//!
//! Catalog batches, queue batches, persona saves and queue promotions each
//! run inside one transaction, so a failure part-way through leaves no
//! partial write behind.

use super::{Catalog, ModerationQueue, Personas, SpellStore};
use crate::models::{CatalogWrite, ModerationStatus, QueueEntry, Submitter};
use crate::persona::{Persona, PersonaBook};
use crate::record::{Identity, Record};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Catalog, moderation queue and personas stored in the `spells`,
/// `pending_spells` and `personas` tables
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap a pool whose schema was created by [`crate::db::init_database`]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn upsert_spell<'e, E>(executor: E, identity: &Identity, record: &Record) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let data = serde_json::to_string(record)?;
    sqlx::query(
        r#"
        INSERT INTO spells (identity, data, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(identity) DO UPDATE SET
            data = excluded.data,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(identity.as_str())
    .bind(data)
    .execute(executor)
    .await?;

    Ok(())
}

async fn delete_spell<'e, E>(executor: E, identity: &Identity) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM spells WHERE identity = ?")
        .bind(identity.as_str())
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

async fn insert_pending_spell<'e, E>(executor: E, entry: &QueueEntry) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let data = serde_json::to_string(&entry.record)?;
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO pending_spells
            (identity, submission_id, data, submitted_by, status, submitted_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.identity.as_str())
    .bind(entry.submission_id.to_string())
    .bind(data)
    .bind(entry.submitted_by.as_str())
    .bind(entry.status.as_str())
    .bind(entry.submitted_at)
    .execute(executor)
    .await?;

    Ok(())
}

async fn delete_pending_spell<'e, E>(executor: E, identity: &Identity) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM pending_spells WHERE identity = ?")
        .bind(identity.as_str())
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn decode_record(data: &str) -> Result<Record> {
    Ok(serde_json::from_str(data)?)
}

fn decode_queue_entry(row: &sqlx::sqlite::SqliteRow) -> Result<QueueEntry> {
    let identity: String = row.try_get("identity")?;
    let submission_id: String = row.try_get("submission_id")?;
    let data: String = row.try_get("data")?;
    let submitted_by: String = row.try_get("submitted_by")?;
    let status: String = row.try_get("status")?;
    let submitted_at: DateTime<Utc> = row.try_get("submitted_at")?;

    if status != ModerationStatus::Pending.as_str() {
        return Err(Error::Internal(format!(
            "pending spell {} has unexpected status {:?}",
            identity, status
        )));
    }

    let submission_id = Uuid::parse_str(&submission_id)
        .map_err(|e| Error::Internal(format!("invalid submission id {:?}: {}", submission_id, e)))?;

    Ok(QueueEntry {
        identity: Identity::from_normalized(identity),
        submission_id,
        record: decode_record(&data)?,
        submitted_by: Submitter::from(submitted_by),
        status: ModerationStatus::Pending,
        submitted_at,
    })
}

#[async_trait]
impl Catalog for SqliteStore {
    async fn get(&self, identity: &Identity) -> Result<Option<Record>> {
        let data: Option<String> = sqlx::query_scalar("SELECT data FROM spells WHERE identity = ?")
            .bind(identity.as_str())
            .fetch_optional(&self.pool)
            .await?;

        data.as_deref().map(decode_record).transpose()
    }

    async fn get_all(&self) -> Result<BTreeMap<Identity, Record>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT identity, data FROM spells ORDER BY identity",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(identity, data)| -> Result<(Identity, Record)> {
                Ok((Identity::from_normalized(identity), decode_record(&data)?))
            })
            .collect()
    }

    async fn upsert(&self, identity: &Identity, record: &Record) -> Result<()> {
        upsert_spell(&self.pool, identity, record).await
    }

    async fn delete(&self, identity: &Identity) -> Result<bool> {
        delete_spell(&self.pool, identity).await
    }

    async fn apply(&self, writes: &[CatalogWrite]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for write in writes {
            match write {
                CatalogWrite::Upsert { identity, record } => {
                    upsert_spell(&mut *tx, identity, record).await?
                }
                CatalogWrite::Delete { identity } => {
                    delete_spell(&mut *tx, identity).await?;
                }
            }
        }

        tx.commit().await?;
        debug!("Committed catalog batch of {} write(s)", writes.len());

        Ok(())
    }
}

#[async_trait]
impl ModerationQueue for SqliteStore {
    async fn list_pending(&self) -> Result<Vec<QueueEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT identity, submission_id, data, submitted_by, status, submitted_at
            FROM pending_spells
            ORDER BY submitted_at, identity
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_queue_entry).collect()
    }

    async fn get_pending(&self, identity: &Identity) -> Result<Option<QueueEntry>> {
        let row = sqlx::query(
            r#"
            SELECT identity, submission_id, data, submitted_by, status, submitted_at
            FROM pending_spells
            WHERE identity = ?
            "#,
        )
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_queue_entry).transpose()
    }

    async fn append_pending(&self, entry: &QueueEntry) -> Result<()> {
        insert_pending_spell(&self.pool, entry).await
    }

    async fn append_all(&self, entries: &[QueueEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            insert_pending_spell(&mut *tx, entry).await?;
        }

        tx.commit().await?;
        debug!("Committed {} pending spell(s)", entries.len());

        Ok(())
    }

    async fn delete_pending(&self, identity: &Identity) -> Result<bool> {
        delete_pending_spell(&self.pool, identity).await
    }
}

#[async_trait]
impl Personas for SqliteStore {
    async fn list_personas(&self) -> Result<PersonaBook> {
        let rows = sqlx::query("SELECT name, data FROM personas ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<(String, Persona)> {
                let name: String = row.try_get("name")?;
                let data: String = row.try_get("data")?;
                Ok((name, serde_json::from_str(&data)?))
            })
            .collect()
    }

    async fn get_persona(&self, name: &str) -> Result<Option<Persona>> {
        let data: Option<String> = sqlx::query_scalar("SELECT data FROM personas WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn save_personas(&self, personas: &PersonaBook) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (name, persona) in personas {
            let data = serde_json::to_string(persona)?;
            sqlx::query(
                r#"
                INSERT INTO personas (name, data, updated_at)
                VALUES (?, ?, CURRENT_TIMESTAMP)
                ON CONFLICT(name) DO UPDATE SET
                    data = excluded.data,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(name.as_str())
            .bind(data)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Committed {} persona(s)", personas.len());

        Ok(())
    }

    async fn delete_persona(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM personas WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SpellStore for SqliteStore {
    async fn promote(
        &self,
        queue_identity: &Identity,
        identity: &Identity,
        record: &Record,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Dropping the transaction without commit rolls it back
        if !delete_pending_spell(&mut *tx, queue_identity).await? {
            return Err(Error::NotFound(format!("pending spell {}", queue_identity)));
        }
        upsert_spell(&mut *tx, identity, record).await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use crate::record::NAME_FIELD;

    async fn store() -> SqliteStore {
        SqliteStore::new(
            init_memory_database()
                .await
                .expect("Failed to create in-memory database"),
        )
    }

    fn spell(name: &str) -> Record {
        Record::new().with(NAME_FIELD, name).with("Level", "1")
    }

    #[tokio::test]
    async fn test_catalog_round_trip() {
        let store = store().await;
        let identity = Identity::of("Magic Missile");

        assert!(store.get(&identity).await.unwrap().is_none());
        store.upsert(&identity, &spell("Magic Missile")).await.unwrap();
        assert_eq!(store.get(&identity).await.unwrap(), Some(spell("Magic Missile")));

        store
            .upsert(&identity, &spell("Magic Missile").with("Level", "2"))
            .await
            .unwrap();
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[&identity].get("Level"), Some("2"));

        assert!(store.delete(&identity).await.unwrap());
        assert!(!store.delete(&identity).await.unwrap());
    }

    #[tokio::test]
    async fn test_apply_runs_as_one_batch() {
        let store = store().await;
        store.upsert(&Identity::of("Old"), &spell("Old")).await.unwrap();

        store
            .apply(&[
                CatalogWrite::Upsert {
                    identity: Identity::of("New"),
                    record: spell("New"),
                },
                CatalogWrite::Delete {
                    identity: Identity::of("Old"),
                },
            ])
            .await
            .unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.keys().map(Identity::as_str).collect::<Vec<_>>(), vec!["new"]);
    }

    #[tokio::test]
    async fn test_queue_round_trip_preserves_metadata() {
        let store = store().await;
        let entry = QueueEntry::pending(
            Identity::of("Mage Armor"),
            spell("Mage Armor"),
            Submitter::Named("alice".to_string()),
        );

        store.append_pending(&entry).await.unwrap();
        let loaded = store.get_pending(&entry.identity).await.unwrap().unwrap();

        assert_eq!(loaded.identity, entry.identity);
        assert_eq!(loaded.submission_id, entry.submission_id);
        assert_eq!(loaded.record, entry.record);
        assert_eq!(loaded.submitted_by, entry.submitted_by);
        assert_eq!(loaded.status, ModerationStatus::Pending);
    }

    #[tokio::test]
    async fn test_append_replaces_pending_entry_with_same_identity() {
        let store = store().await;
        let first = QueueEntry::pending(Identity::of("Light"), spell("Light"), Submitter::Anonymous);
        let second = QueueEntry::pending(
            Identity::of("Light"),
            spell("LIGHT").with("Level", "Cantrip"),
            Submitter::Named("bob".to_string()),
        );

        store.append_pending(&first).await.unwrap();
        store.append_pending(&second).await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].submission_id, second.submission_id);
    }

    #[tokio::test]
    async fn test_promote_is_transactional() {
        let store = store().await;
        let identity = Identity::of("Light");

        let missing = store.promote(&identity, &identity, &spell("Light")).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
        assert!(store.get(&identity).await.unwrap().is_none());

        let entry = QueueEntry::pending(identity.clone(), spell("Light"), Submitter::Anonymous);
        store.append_pending(&entry).await.unwrap();
        store.promote(&identity, &identity, &spell("Light")).await.unwrap();

        assert!(store.get_pending(&identity).await.unwrap().is_none());
        assert_eq!(store.get(&identity).await.unwrap(), Some(spell("Light")));
    }

    #[tokio::test]
    async fn test_append_all_rolls_back_on_failure() {
        let store = store().await;
        sqlx::query(
            "CREATE TRIGGER reject_shield BEFORE INSERT ON pending_spells \
             WHEN NEW.identity = 'shield' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let entries: Vec<QueueEntry> = ["Light", "Shield", "Sleep"]
            .into_iter()
            .map(|name| QueueEntry::pending(Identity::of(name), spell(name), Submitter::Anonymous))
            .collect();

        assert!(store.append_all(&entries).await.is_err());
        assert!(store.list_pending().await.unwrap().is_empty());

        store.append_all(&entries[..1]).await.unwrap();
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_personas_round_trip_and_replace() {
        let store = store().await;
        let mut persona = Persona::with_spells(["Light", "Sleep"]);
        persona
            .extra
            .insert("ownerPinHash".to_string(), serde_json::json!("abc123"));

        store
            .save_personas(&PersonaBook::from([("mira".to_string(), persona.clone())]))
            .await
            .unwrap();
        assert_eq!(store.get_persona("mira").await.unwrap(), Some(persona));

        store
            .save_personas(&PersonaBook::from([
                ("mira".to_string(), Persona::with_spells(["Shield"])),
                ("tobin".to_string(), Persona::default()),
            ]))
            .await
            .unwrap();

        let book = store.list_personas().await.unwrap();
        assert_eq!(book.keys().collect::<Vec<_>>(), vec!["mira", "tobin"]);
        assert_eq!(book["mira"].spells, vec!["Shield"]);
        assert!(book["mira"].extra.is_empty());

        assert!(store.delete_persona("tobin").await.unwrap());
        assert!(!store.delete_persona("tobin").await.unwrap());
        assert!(store.get_persona("tobin").await.unwrap().is_none());
    }
}
