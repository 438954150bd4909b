//! StateStore — redb-backed entity registry and snapshot history.
//!
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, WriteTransaction};
use tracing::{debug, info};

use cyclescan_core::{EntityMeta, EntitySnapshot, Snapshot, SnapshotSource};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(ENTITIES).map_err(map_err!(Table))?;
        txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Increments on every committed write.
    pub fn data_version(&self) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(META).map_err(map_err!(Table))?;
        let version = table
            .get(DATA_VERSION_KEY)
            .map_err(map_err!(Read))?
            .map_or(0, |v| v.value());
        Ok(version)
    }

    fn bump_version(txn: &WriteTransaction) -> StateResult<()> {
        let mut table = txn.open_table(META).map_err(map_err!(Table))?;
        let current = table
            .get(DATA_VERSION_KEY)
            .map_err(map_err!(Read))?
            .map_or(0, |v| v.value());
        table
            .insert(DATA_VERSION_KEY, current + 1)
            .map_err(map_err!(Write))?;
        Ok(())
    }

    // ── Entities ───────────────────────────────────────────────────

    /// Insert or replace entity metadata. Returns the number written.
    ///
    /// Group labels and websites are trimmed and truncated; blank values
    /// are stored as absent.
    pub fn import_entities(&self, entities: &[EntityMeta]) -> StateResult<usize> {
        for meta in entities {
            check_entity_id(&meta.entity_id)?;
        }
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ENTITIES).map_err(map_err!(Table))?;
            for meta in entities {
                let cleaned = EntityMeta {
                    entity_id: meta.entity_id.clone(),
                    group: clean_label(meta.group.as_deref(), MAX_GROUP_BYTES),
                    website: clean_label(meta.website.as_deref(), MAX_WEBSITE_BYTES),
                    valid: meta.valid,
                };
                let value = serde_json::to_vec(&cleaned).map_err(map_err!(Serialize))?;
                table
                    .insert(cleaned.entity_id.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        Self::bump_version(&txn)?;
        txn.commit().map_err(map_err!(Transaction))?;
        info!(count = entities.len(), "entities imported");
        Ok(entities.len())
    }

    pub fn get_entity(&self, entity_id: &str) -> StateResult<Option<EntityMeta>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ENTITIES).map_err(map_err!(Table))?;
        match table.get(entity_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let meta: EntityMeta =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    /// All entities, ordered by id.
    pub fn list_entities(&self) -> StateResult<Vec<EntityMeta>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ENTITIES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let meta: EntityMeta =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(meta);
        }
        Ok(results)
    }

    /// Patch group and website. Returns false for an unknown entity.
    pub fn update_entity(&self, entity_id: &str, update: &EntityUpdate) -> StateResult<bool> {
        self.modify_entity(entity_id, |meta| {
            if let Some(group) = &update.group {
                meta.group = clean_label(Some(group), MAX_GROUP_BYTES);
            }
            if let Some(website) = &update.website {
                meta.website = clean_label(Some(website), MAX_WEBSITE_BYTES);
            }
        })
    }

    /// Flag an entity valid or invalid. Returns false for an unknown entity.
    pub fn set_valid(&self, entity_id: &str, valid: bool) -> StateResult<bool> {
        let existed = self.modify_entity(entity_id, |meta| meta.valid = valid)?;
        debug!(%entity_id, valid, existed, "validity updated");
        Ok(existed)
    }

    fn modify_entity(
        &self,
        entity_id: &str,
        apply: impl FnOnce(&mut EntityMeta),
    ) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ENTITIES).map_err(map_err!(Table))?;
            let current = table
                .get(entity_id)
                .map_err(map_err!(Read))?
                .map(|guard| serde_json::from_slice::<EntityMeta>(guard.value()))
                .transpose()
                .map_err(map_err!(Deserialize))?;
            let Some(mut meta) = current else {
                return Ok(false);
            };
            apply(&mut meta);
            let value = serde_json::to_vec(&meta).map_err(map_err!(Serialize))?;
            table
                .insert(entity_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        Self::bump_version(&txn)?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(true)
    }

    /// Delete entities together with their snapshot history. Returns the
    /// number of entities that existed.
    pub fn remove_entities(&self, entity_ids: &[&str]) -> StateResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut removed = 0;
        let mut snapshots_removed = 0;
        {
            let mut entities = txn.open_table(ENTITIES).map_err(map_err!(Table))?;
            let mut snapshots = txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
            for entity_id in entity_ids {
                if entities.remove(*entity_id).map_err(map_err!(Write))?.is_some() {
                    removed += 1;
                }
                let (start, end) = snapshot_range(entity_id, 0);
                let keys: Vec<String> = snapshots
                    .range(start.as_str()..=end.as_str())
                    .map_err(map_err!(Read))?
                    .map(|item| item.map(|(k, _)| k.value().to_string()))
                    .collect::<Result<_, _>>()
                    .map_err(map_err!(Read))?;
                for key in &keys {
                    snapshots.remove(key.as_str()).map_err(map_err!(Write))?;
                }
                snapshots_removed += keys.len();
            }
        }
        Self::bump_version(&txn)?;
        txn.commit().map_err(map_err!(Transaction))?;
        info!(removed, snapshots_removed, "entities removed");
        Ok(removed)
    }

    // ── Snapshots ──────────────────────────────────────────────────

    /// Record one snapshot. A second write at the same timestamp replaces
    /// the first.
    pub fn put_snapshot(&self, snapshot: &EntitySnapshot) -> StateResult<()> {
        self.put_snapshots(std::slice::from_ref(snapshot)).map(|_| ())
    }

    /// Record many snapshots in one transaction. Returns the number written.
    pub fn put_snapshots(&self, snapshots: &[EntitySnapshot]) -> StateResult<usize> {
        for snapshot in snapshots {
            check_entity_id(&snapshot.entity_id)?;
        }
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
            for snapshot in snapshots {
                let key = snapshot_key(&snapshot.entity_id, snapshot.timestamp);
                let value =
                    serde_json::to_vec(&snapshot.snapshot()).map_err(map_err!(Serialize))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        Self::bump_version(&txn)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count = snapshots.len(), "snapshots stored");
        Ok(snapshots.len())
    }

    /// Snapshots for one entity with `timestamp >= since_ms`, oldest first.
    pub fn list_snapshots(&self, entity_id: &str, since_ms: u64) -> StateResult<Vec<Snapshot>> {
        let (start, end) = snapshot_range(entity_id, since_ms);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table
            .range(start.as_str()..=end.as_str())
            .map_err(map_err!(Read))?
        {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let snapshot: Snapshot =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(snapshot);
        }
        Ok(results)
    }

    /// The newest snapshot of an entity, if any.
    pub fn latest_balance(&self, entity_id: &str) -> StateResult<Option<Snapshot>> {
        let (start, end) = snapshot_range(entity_id, 0);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
        let last = table
            .range(start.as_str()..=end.as_str())
            .map_err(map_err!(Read))?
            .next_back()
            .transpose()
            .map_err(map_err!(Read))?;
        match last {
            Some((_, value)) => {
                let snapshot: Snapshot =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Delete every snapshot older than `cutoff_ms`. Returns the number
    /// deleted.
    pub fn prune_before(&self, cutoff_ms: u64) -> StateResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count;
        {
            let mut table = txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
            let mut stale = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (key, _) = entry.map_err(map_err!(Read))?;
                let key = key.value();
                let (_, timestamp) = parse_snapshot_key(key)
                    .ok_or_else(|| StateError::MalformedKey(key.to_string()))?;
                if timestamp < cutoff_ms {
                    stale.push(key.to_string());
                }
            }
            for key in &stale {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
            count = stale.len();
        }
        if count > 0 {
            Self::bump_version(&txn)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        info!(cutoff_ms, count, "pruned snapshots");
        Ok(count)
    }

    pub fn stats(&self) -> StateResult<StoreStats> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let snapshots = txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
        let snapshot_count = snapshots.len().map_err(map_err!(Read))?;
        drop(snapshots);
        drop(txn);

        let entities = self.list_entities()?;
        let groups: BTreeSet<&str> = entities
            .iter()
            .filter_map(|meta| meta.group.as_deref())
            .collect();
        Ok(StoreStats {
            entities: entities.len(),
            snapshots: snapshot_count as usize,
            groups: groups.len(),
        })
    }
}

impl SnapshotSource for StateStore {
    type Error = StateError;

    fn list_snapshots(&self, entity_id: &str, since_ms: u64) -> StateResult<Vec<Snapshot>> {
        StateStore::list_snapshots(self, entity_id, since_ms)
    }

    fn entity(&self, entity_id: &str) -> StateResult<Option<EntityMeta>> {
        self.get_entity(entity_id)
    }

    fn list_entities(&self) -> StateResult<Vec<EntityMeta>> {
        StateStore::list_entities(self)
    }
}

fn check_entity_id(entity_id: &str) -> StateResult<()> {
    if entity_id.is_empty() || entity_id.contains(':') {
        return Err(StateError::InvalidEntity(entity_id.to_string()));
    }
    Ok(())
}
