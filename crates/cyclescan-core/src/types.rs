//! Shared types used across CycleScan crates.
//!
//! Balances are `u128` end to end. Observed balances reach 10^17 cycles,
//! well past what an `f64` represents exactly, so nothing here stores or
//! compares a balance as a float.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Identifier of a tracked entity (a canister principal in practice).
pub type EntityId = String;

/// Identifier of a group of entities (the owning project).
pub type GroupId = String;

pub const MS_PER_HOUR: u64 = 3_600_000;
pub const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

// ── Snapshot ──────────────────────────────────────────────────────

/// One observed balance for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub balance: u128,
}

impl Snapshot {
    pub fn new(timestamp: u64, balance: u128) -> Self {
        Self { timestamp, balance }
    }
}

/// A snapshot tagged with the entity it belongs to, as found in import files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_id: EntityId,
    pub timestamp: u64,
    pub balance: u128,
}

impl EntitySnapshot {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.timestamp, self.balance)
    }
}

// ── Entity ────────────────────────────────────────────────────────

/// Registry metadata for a tracked entity.
///
/// `valid` is supplied by an external classifier. Invalid entities stay in
/// the registry and keep their snapshots; they are only left out of group
/// sums and leaderboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub entity_id: EntityId,
    #[serde(default)]
    pub group: Option<GroupId>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

impl EntityMeta {
    pub fn new(entity_id: impl Into<EntityId>) -> Self {
        Self {
            entity_id: entity_id.into(),
            group: None,
            website: None,
            valid: true,
        }
    }

    pub fn with_group(mut self, group: impl Into<GroupId>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }
}

// ── Window ────────────────────────────────────────────────────────

/// A named lookback span used to select which snapshots feed an estimate.
///
/// The span only selects input. Rates are always reported per hour no
/// matter which window produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct Window {
    pub name: String,
    pub span_ms: u64,
}

/// Wire shape of [`Window`]; deserialized windows go through [`Window::new`].
#[derive(Deserialize)]
struct RawWindow {
    name: String,
    span_ms: u64,
}

impl TryFrom<RawWindow> for Window {
    type Error = CoreError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        Window::new(raw.name, raw.span_ms)
    }
}

impl Window {
    pub fn new(name: impl Into<String>, span_ms: u64) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::UnnamedWindow);
        }
        if span_ms == 0 {
            return Err(CoreError::EmptyWindow(name));
        }
        Ok(Self { name, span_ms })
    }

    pub fn from_hours(name: impl Into<String>, hours: u64) -> Result<Self, CoreError> {
        Self::new(name, hours.saturating_mul(MS_PER_HOUR))
    }

    /// Last ~2 hours of snapshots.
    pub fn recent() -> Self {
        Self {
            name: "recent".to_string(),
            span_ms: 2 * MS_PER_HOUR,
        }
    }

    /// Last ~36 hours of snapshots.
    pub fn short_term() -> Self {
        Self {
            name: "short".to_string(),
            span_ms: 36 * MS_PER_HOUR,
        }
    }

    /// Last 7 days of snapshots.
    pub fn long_term() -> Self {
        Self {
            name: "long".to_string(),
            span_ms: 168 * MS_PER_HOUR,
        }
    }

    /// The default window set, shortest first.
    pub fn defaults() -> Vec<Window> {
        vec![Self::recent(), Self::short_term(), Self::long_term()]
    }

    /// Earliest timestamp (inclusive) that falls inside this window.
    pub fn cutoff(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.span_ms)
    }

    /// Whether `timestamp` lies in `[now - span, now]`.
    pub fn contains(&self, timestamp: u64, now_ms: u64) -> bool {
        timestamp >= self.cutoff(now_ms) && timestamp <= now_ms
    }

    pub fn hours(&self) -> f64 {
        self.span_ms as f64 / MS_PER_HOUR as f64
    }
}

/// Sort windows shortest first and reject duplicate names.
pub fn normalize_windows(mut windows: Vec<Window>) -> Result<Vec<Window>, CoreError> {
    windows.sort_by_key(|w| w.span_ms);
    for (i, w) in windows.iter().enumerate() {
        if windows[..i].iter().any(|prev| prev.name == w.name) {
            return Err(CoreError::DuplicateWindow(w.name.clone()));
        }
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_span_window_is_rejected() {
        assert_eq!(
            Window::new("flat", 0),
            Err(CoreError::EmptyWindow("flat".to_string()))
        );
        assert_eq!(Window::new("  ", 10), Err(CoreError::UnnamedWindow));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let w = Window::from_hours("h", 1).unwrap();
        let now = 10 * MS_PER_HOUR;
        assert!(w.contains(9 * MS_PER_HOUR, now));
        assert!(w.contains(now, now));
        assert!(!w.contains(9 * MS_PER_HOUR - 1, now));
        assert!(!w.contains(now + 1, now));
    }

    #[test]
    fn cutoff_saturates_near_epoch() {
        let w = Window::long_term();
        assert_eq!(w.cutoff(1_000), 0);
    }

    #[test]
    fn normalize_sorts_and_rejects_duplicates() {
        let windows = normalize_windows(vec![
            Window::long_term(),
            Window::recent(),
            Window::short_term(),
        ])
        .unwrap();
        let names: Vec<_> = windows.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, ["recent", "short", "long"]);

        let err = normalize_windows(vec![Window::recent(), Window::recent()]).unwrap_err();
        assert_eq!(err, CoreError::DuplicateWindow("recent".to_string()));
    }

    #[test]
    fn deserialized_windows_are_validated() {
        let w: Window = serde_json::from_str(r#"{"name":"day","span_ms":86400000}"#).unwrap();
        assert_eq!(w, Window::from_hours("day", 24).unwrap());

        let err = serde_json::from_str::<Window>(r#"{"name":"flat","span_ms":0}"#).unwrap_err();
        assert!(err.to_string().contains("flat"), "{err}");
        assert!(serde_json::from_str::<Window>(r#"{"name":" ","span_ms":5}"#).is_err());
    }

    #[test]
    fn entity_meta_defaults_to_valid() {
        let meta: EntityMeta = serde_json::from_str(r#"{"entity_id":"abc"}"#).unwrap();
        assert!(meta.valid);
        assert!(meta.group.is_none());
    }

    #[test]
    fn snapshot_balance_survives_json_beyond_u64() {
        let snap = Snapshot::new(1, u64::MAX as u128 * 1000);
        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
