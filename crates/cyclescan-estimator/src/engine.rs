//! Engine — binds a snapshot source to the estimation pipeline.
//!
//! Every call recomputes from the snapshots the source returns; the
//! engine keeps no state between calls. Callers that want reuse within a
//! session go through [`EstimateCache`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info};

use cyclescan_core::{
    CoreError, CycleScanConfig, EntityId, EntityMeta, GroupId, Snapshot, SnapshotSource, Window,
    normalize_windows,
};

use crate::aggregate::{AggregateView, GroupAggregate, MemberEstimate, aggregate};
use crate::cache::{CacheKey, EstimateCache};
use crate::error::{EstimateError, EstimateResult};
use crate::rate::{RateOutcome, estimate_window};
use crate::runway::{RunwayEstimate, RunwayPolicy};

/// Everything the estimator knows about one entity at `now`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity_id: EntityId,
    pub group: Option<GroupId>,
    pub website: Option<String>,
    pub valid: bool,
    /// Latest balance at or before `now`; `None` when never sampled.
    pub balance: Option<u128>,
    pub last_seen: Option<u64>,
    /// One outcome per configured window, shortest first.
    pub outcomes: Vec<RateOutcome>,
    pub runway: RunwayEstimate,
}

impl EntityReport {
    pub fn outcome(&self, window: &str) -> Option<&RateOutcome> {
        self.outcomes.iter().find(|o| o.window().name == window)
    }

    pub fn rate(&self, window: &str) -> Option<u128> {
        self.outcome(window).and_then(RateOutcome::rate)
    }

    pub fn member(&self) -> MemberEstimate {
        MemberEstimate {
            entity_id: self.entity_id.clone(),
            balance: self.balance.unwrap_or(0),
            outcomes: self.outcomes.clone(),
            valid: self.valid,
            website: self.website.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Engine<S> {
    source: S,
    windows: Arc<[Window]>,
    policy: RunwayPolicy,
}

impl<S: SnapshotSource> Engine<S> {
    pub fn new(source: S, windows: Vec<Window>, policy: RunwayPolicy) -> EstimateResult<Self> {
        let windows = normalize_windows(windows)?;
        if windows.is_empty() {
            return Err(EstimateError::NoWindows);
        }
        Ok(Self {
            source,
            windows: windows.into(),
            policy,
        })
    }

    pub fn from_config(source: S, config: &CycleScanConfig) -> EstimateResult<Self> {
        config.validate()?;
        Self::new(source, config.windows()?, config.runway.into())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Configured windows, shortest first.
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn window(&self, name: &str) -> EstimateResult<&Window> {
        self.windows
            .iter()
            .find(|w| w.name == name)
            .ok_or_else(|| CoreError::UnknownWindow(name.to_string()).into())
    }

    pub fn policy(&self) -> &RunwayPolicy {
        &self.policy
    }

    /// Rate for one entity over one window.
    ///
    /// An entity the source has never seen simply has no snapshots and
    /// yields [`RateOutcome::InsufficientData`].
    pub fn estimate_rate(
        &self,
        entity_id: &str,
        window: &Window,
        now_ms: u64,
    ) -> EstimateResult<RateOutcome> {
        let snapshots = self
            .source
            .list_snapshots(entity_id, window.cutoff(now_ms))
            .map_err(EstimateError::from_source)?;
        Ok(estimate_window(&snapshots, window, now_ms))
    }

    pub fn estimate_runway(&self, entity_id: &str, now_ms: u64) -> EstimateResult<RunwayEstimate> {
        let snapshots = self.history(entity_id)?;
        let outcomes = self.outcomes(&snapshots, now_ms);
        let balance = latest_at(&snapshots, now_ms).map_or(0, |s| s.balance);
        Ok(self.policy.project_outcomes(balance, &outcomes))
    }

    pub fn entity_report(&self, entity_id: &str, now_ms: u64) -> EstimateResult<EntityReport> {
        let meta = self
            .source
            .entity(entity_id)
            .map_err(EstimateError::from_source)?
            .ok_or_else(|| EstimateError::UnknownEntity(entity_id.to_string()))?;
        self.report_for(&meta, now_ms)
    }

    pub fn report_for(&self, meta: &EntityMeta, now_ms: u64) -> EstimateResult<EntityReport> {
        let snapshots = self.history(&meta.entity_id)?;
        let outcomes = self.outcomes(&snapshots, now_ms);
        let latest = latest_at(&snapshots, now_ms);
        let balance = latest.map(|s| s.balance);
        let runway = self
            .policy
            .project_outcomes(balance.unwrap_or(0), &outcomes);

        debug!(
            entity_id = %meta.entity_id,
            snapshots = snapshots.len(),
            severity = runway.severity.label(),
            "entity report built"
        );
        Ok(EntityReport {
            entity_id: meta.entity_id.clone(),
            group: meta.group.clone(),
            website: meta.website.clone(),
            valid: meta.valid,
            balance,
            last_seen: latest.map(|s| s.timestamp),
            outcomes,
            runway,
        })
    }

    /// Reports for every registered entity, computed sequentially.
    pub fn reports(&self, now_ms: u64) -> EstimateResult<Vec<EntityReport>> {
        self.list_entities()?
            .iter()
            .map(|meta| self.report_for(meta, now_ms))
            .collect()
    }

    /// Like [`Engine::reports`], reusing whatever `cache` holds for the same
    /// data version and `now`.
    pub fn reports_cached(
        &self,
        cache: &mut EstimateCache,
        data_version: u64,
        now_ms: u64,
    ) -> EstimateResult<Vec<EntityReport>> {
        cache.sync(CacheKey {
            data_version,
            now_ms,
        });
        let mut reports = Vec::new();
        for meta in self.list_entities()? {
            let report = cache.get_or_try_insert_with(&meta.entity_id, || {
                self.report_for(&meta, now_ms)
            })?;
            reports.push(report.clone());
        }
        Ok(reports)
    }

    /// Aggregate one group, reading its members from the source.
    pub fn aggregate(
        &self,
        group_id: &str,
        now_ms: u64,
        view: AggregateView,
    ) -> EstimateResult<GroupAggregate> {
        let members: Vec<EntityMeta> = self
            .list_entities()?
            .into_iter()
            .filter(|m| m.group.as_deref() == Some(group_id))
            .collect();
        if members.is_empty() {
            return Err(EstimateError::UnknownGroup(group_id.to_string()));
        }
        let reports = members
            .iter()
            .map(|meta| self.report_for(meta, now_ms))
            .collect::<EstimateResult<Vec<_>>>()?;
        Ok(self.aggregate_reports(group_id, &reports, view))
    }

    /// Aggregate the members of `group_id` found in `reports`.
    pub fn aggregate_reports(
        &self,
        group_id: &str,
        reports: &[EntityReport],
        view: AggregateView,
    ) -> GroupAggregate {
        let members: Vec<MemberEstimate> = reports
            .iter()
            .filter(|r| r.group.as_deref() == Some(group_id))
            .map(EntityReport::member)
            .collect();
        aggregate(group_id, &members, &self.windows, &self.policy, view)
    }

    /// Aggregate every group with at least one contributing member,
    /// ordered by group id. Entities without a group are skipped.
    pub fn aggregate_all(
        &self,
        reports: &[EntityReport],
        view: AggregateView,
    ) -> Vec<GroupAggregate> {
        let mut groups: BTreeMap<&str, Vec<MemberEstimate>> = BTreeMap::new();
        for report in reports {
            if let Some(group) = report.group.as_deref() {
                groups.entry(group).or_default().push(report.member());
            }
        }
        groups
            .into_iter()
            .map(|(group_id, members)| {
                aggregate(group_id, &members, &self.windows, &self.policy, view)
            })
            .filter(|g| g.member_count > 0)
            .collect()
    }

    fn list_entities(&self) -> EstimateResult<Vec<EntityMeta>> {
        self.source
            .list_entities()
            .map_err(EstimateError::from_source)
    }

    fn history(&self, entity_id: &str) -> EstimateResult<Vec<Snapshot>> {
        self.source
            .list_snapshots(entity_id, 0)
            .map_err(EstimateError::from_source)
    }

    fn outcomes(&self, snapshots: &[Snapshot], now_ms: u64) -> Vec<RateOutcome> {
        self.windows
            .iter()
            .map(|window| estimate_window(snapshots, window, now_ms))
            .collect()
    }
}

impl<S> Engine<S>
where
    S: SnapshotSource + Clone + Send + Sync + 'static,
{
    /// Build reports for `entities` across the blocking pool.
    ///
    /// Entities are independent, so chunks run without coordination; the
    /// result keeps the input order.
    pub async fn estimate_many(
        &self,
        entities: Vec<EntityMeta>,
        now_ms: u64,
    ) -> EstimateResult<Vec<EntityReport>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let workers = std::thread::available_parallelism().map_or(4, |n| n.get());
        let chunk_size = entities.len().div_ceil(workers).max(1);

        let mut tasks = JoinSet::new();
        for (index, chunk) in entities.chunks(chunk_size).enumerate() {
            let engine = self.clone();
            let chunk = chunk.to_vec();
            tasks.spawn_blocking(move || {
                let reports = chunk
                    .iter()
                    .map(|meta| engine.report_for(meta, now_ms))
                    .collect::<EstimateResult<Vec<_>>>();
                (index, reports)
            });
        }

        let mut parts = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (index, reports) = joined?;
            parts.push((index, reports?));
        }
        parts.sort_by_key(|(index, _)| *index);

        let reports: Vec<EntityReport> = parts.into_iter().flat_map(|(_, r)| r).collect();
        info!(entities = reports.len(), chunks = workers.min(entities.len()), "estimated entities");
        Ok(reports)
    }
}

/// Latest snapshot at or before `now`; last write wins on equal timestamps.
fn latest_at(snapshots: &[Snapshot], now_ms: u64) -> Option<Snapshot> {
    snapshots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.timestamp <= now_ms)
        .max_by_key(|(index, s)| (s.timestamp, *index))
        .map(|(_, s)| *s)
}
