//! redb table definitions for the CycleScan state store.

use redb::TableDefinition;

/// Entity metadata keyed by `{entity_id}`.
pub const ENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entities");

/// Balance snapshots keyed by `{entity_id}:{timestamp:020}`.
pub const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Store-wide counters.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

pub const DATA_VERSION_KEY: &str = "data_version";

/// Zero-padded so lexicographic key order is chronological.
pub fn snapshot_key(entity_id: &str, timestamp: u64) -> String {
    format!("{entity_id}:{timestamp:020}")
}

/// Inclusive key bounds covering every snapshot of `entity_id` at or after
/// `since_ms`.
pub fn snapshot_range(entity_id: &str, since_ms: u64) -> (String, String) {
    (
        snapshot_key(entity_id, since_ms),
        snapshot_key(entity_id, u64::MAX),
    )
}

/// Split a snapshot key back into entity id and timestamp.
pub fn parse_snapshot_key(key: &str) -> Option<(&str, u64)> {
    let (entity_id, ts) = key.rsplit_once(':')?;
    Some((entity_id, ts.parse().ok()?))
}
