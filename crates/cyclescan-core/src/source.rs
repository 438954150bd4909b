//! The interface the estimator reads snapshot history and entity
//! classification through.
//!
//! Collection and storage live outside the estimator. Anything that can
//! list an entity's snapshots and report its group and validity can feed
//! it: the redb store in `cyclescan-state`, or a plain in-memory map in
//! tests.

use crate::types::{EntityMeta, GroupId, Snapshot};

pub trait SnapshotSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Snapshots for `entity_id` with `timestamp >= since_ms`.
    ///
    /// Order is not guaranteed; callers sort.
    fn list_snapshots(&self, entity_id: &str, since_ms: u64) -> Result<Vec<Snapshot>, Self::Error>;

    /// Registry metadata, or `None` for an unknown entity.
    fn entity(&self, entity_id: &str) -> Result<Option<EntityMeta>, Self::Error>;

    /// Every registered entity, valid or not.
    fn list_entities(&self) -> Result<Vec<EntityMeta>, Self::Error>;

    fn group_key(&self, entity_id: &str) -> Result<Option<GroupId>, Self::Error> {
        Ok(self.entity(entity_id)?.and_then(|meta| meta.group))
    }

    /// Unknown entities are reported as invalid.
    fn is_valid(&self, entity_id: &str) -> Result<bool, Self::Error> {
        Ok(self.entity(entity_id)?.is_some_and(|meta| meta.valid))
    }
}
