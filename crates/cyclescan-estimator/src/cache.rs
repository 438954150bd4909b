//! Per-session memo of entity reports.
//!
//! Entries are valid for exactly one `(data_version, now)` pair. Any
//! store write bumps the data version, and a different `now` moves every
//! window, so either change drops the whole cache on the next
//! [`EstimateCache::sync`]. Nothing expires on a timer.

use std::collections::HashMap;

use tracing::debug;

use cyclescan_core::EntityId;

use crate::engine::EntityReport;

/// What the cached reports were computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub data_version: u64,
    pub now_ms: u64,
}

#[derive(Debug, Default)]
pub struct EstimateCache {
    key: Option<CacheKey>,
    entries: HashMap<EntityId, EntityReport>,
    hits: u64,
    misses: u64,
}

impl EstimateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the cache at `key`, discarding entries computed for any other.
    pub fn sync(&mut self, key: CacheKey) {
        if self.key != Some(key) {
            if !self.entries.is_empty() {
                debug!(
                    dropped = self.entries.len(),
                    data_version = key.data_version,
                    now_ms = key.now_ms,
                    "estimate cache invalidated"
                );
            }
            self.entries.clear();
            self.key = Some(key);
        }
    }

    pub fn key(&self) -> Option<CacheKey> {
        self.key
    }

    pub fn get(&mut self, entity_id: &str) -> Option<&EntityReport> {
        let found = self.entries.get(entity_id);
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    pub fn insert(&mut self, report: EntityReport) {
        self.entries.insert(report.entity_id.clone(), report);
    }

    pub fn get_or_try_insert_with<E>(
        &mut self,
        entity_id: &str,
        compute: impl FnOnce() -> Result<EntityReport, E>,
    ) -> Result<&EntityReport, E> {
        if self.entries.contains_key(entity_id) {
            self.hits += 1;
        } else {
            self.misses += 1;
            let report = compute()?;
            self.entries.insert(entity_id.to_string(), report);
        }
        // Present on both branches above.
        Ok(&self.entries[entity_id])
    }

    /// Drop every entry and forget the key.
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.key = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runway::RunwayEstimate;

    fn report(id: &str, balance: u128) -> EntityReport {
        EntityReport {
            entity_id: id.to_string(),
            group: None,
            website: None,
            valid: true,
            balance: Some(balance),
            last_seen: Some(0),
            outcomes: vec![],
            runway: RunwayEstimate::infinite(),
        }
    }

    const KEY: CacheKey = CacheKey {
        data_version: 1,
        now_ms: 1000,
    };

    #[test]
    fn computes_once_per_key() {
        let mut cache = EstimateCache::new();
        cache.sync(KEY);

        let mut calls = 0;
        for _ in 0..3 {
            let r = cache
                .get_or_try_insert_with("a", || {
                    calls += 1;
                    Ok::<_, ()>(report("a", 5))
                })
                .unwrap();
            assert_eq!(r.balance, Some(5));
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 2);
    }

    #[test]
    fn new_version_or_now_drops_entries() {
        let mut cache = EstimateCache::new();
        cache.sync(KEY);
        cache.insert(report("a", 5));

        cache.sync(KEY);
        assert_eq!(cache.len(), 1);

        cache.sync(CacheKey {
            data_version: 2,
            ..KEY
        });
        assert!(cache.is_empty());

        cache.insert(report("a", 5));
        cache.sync(CacheKey { now_ms: 2000, ..KEY });
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn failed_compute_caches_nothing() {
        let mut cache = EstimateCache::new();
        cache.sync(KEY);
        let err = cache.get_or_try_insert_with("a", || Err("boom"));
        assert_eq!(err.err(), Some("boom"));
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_forgets_key() {
        let mut cache = EstimateCache::new();
        cache.sync(KEY);
        cache.insert(report("a", 5));
        cache.invalidate();
        assert!(cache.is_empty());
        assert_eq!(cache.key(), None);
    }
}
