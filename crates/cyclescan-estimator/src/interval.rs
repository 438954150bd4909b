//! Interval construction and classification.
//!
//! A snapshot series becomes a sequence of consecutive-pair intervals,
//! each carrying its duration and signed balance delta. Only adjacent
//! snapshots are ever compared.

use serde::{Deserialize, Serialize};
use tracing::trace;

use cyclescan_core::{Snapshot, Window};

/// The span between two consecutive snapshots of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start_time: u64,
    pub end_time: u64,
    /// `end_time - start_time`, always positive.
    pub duration: u64,
    /// `end_balance - start_balance`.
    pub delta: i128,
}

/// What happened to the balance over an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    /// Balance fell or stayed flat; `amount` was consumed.
    Consumption { amount: u128 },
    /// Balance rose; `amount` was injected by a top-up.
    Replenishment { amount: u128 },
}

impl Interval {
    /// Classify by the sign of `delta`.
    ///
    /// Any positive delta counts as a replenishment. There is no noise
    /// threshold.
    pub fn classify(&self) -> IntervalKind {
        if self.delta > 0 {
            IntervalKind::Replenishment {
                amount: self.delta.unsigned_abs(),
            }
        } else {
            IntervalKind::Consumption {
                amount: self.delta.unsigned_abs(),
            }
        }
    }
}

/// Intervals for one entity inside one window, plus the bookkeeping the
/// rate estimator reports alongside its figures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntervalSeries {
    pub intervals: Vec<Interval>,
    /// Distinct snapshot timestamps that fell inside the window.
    pub snapshot_count: usize,
    /// Snapshots discarded because a later write shared their timestamp.
    pub collapsed: usize,
    pub first: Option<Snapshot>,
    pub last: Option<Snapshot>,
}

impl IntervalSeries {
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Oldest-to-newest span of the data actually captured.
    pub fn actual_duration(&self) -> u64 {
        match (self.first, self.last) {
            (Some(first), Some(last)) => last.timestamp.saturating_sub(first.timestamp),
            _ => 0,
        }
    }

    /// Signed change from the first to the last snapshot in the window.
    pub fn net_change(&self) -> i128 {
        match (self.first, self.last) {
            (Some(first), Some(last)) => signed_delta(first.balance, last.balance),
            _ => 0,
        }
    }
}

/// Restrict `snapshots` to `[now - window, now]` and difference
/// consecutive pairs.
///
/// Input order is not trusted. Snapshots sharing a timestamp collapse to
/// the one written last. Fewer than two snapshots in the window yields an
/// empty series, which callers treat as insufficient data.
pub fn build_intervals(snapshots: &[Snapshot], window: &Window, now_ms: u64) -> IntervalSeries {
    let mut in_window: Vec<Snapshot> = snapshots
        .iter()
        .filter(|s| window.contains(s.timestamp, now_ms))
        .copied()
        .collect();
    // Stable sort keeps write order among equal timestamps.
    in_window.sort_by_key(|s| s.timestamp);
    let raw_count = in_window.len();
    let ordered = dedup_last_write_wins(in_window);
    let collapsed = raw_count - ordered.len();
    if collapsed > 0 {
        trace!(collapsed, "collapsed duplicate timestamps");
    }

    let mut series = IntervalSeries {
        snapshot_count: ordered.len(),
        collapsed,
        first: ordered.first().copied(),
        last: ordered.last().copied(),
        ..Default::default()
    };

    for pair in ordered.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        debug_assert!(end.timestamp > start.timestamp);
        series.intervals.push(Interval {
            start_time: start.timestamp,
            end_time: end.timestamp,
            duration: end.timestamp - start.timestamp,
            delta: signed_delta(start.balance, end.balance),
        });
    }

    series
}

fn dedup_last_write_wins(sorted: Vec<Snapshot>) -> Vec<Snapshot> {
    let mut out: Vec<Snapshot> = Vec::with_capacity(sorted.len());
    for snap in sorted {
        match out.last_mut() {
            Some(prev) if prev.timestamp == snap.timestamp => *prev = snap,
            _ => out.push(snap),
        }
    }
    out
}

/// `to - from` without leaving integer arithmetic.
///
/// Balances are bounded far below `i128::MAX`; anything larger saturates.
fn signed_delta(from: u128, to: u128) -> i128 {
    if to >= from {
        i128::try_from(to - from).unwrap_or(i128::MAX)
    } else {
        i128::try_from(from - to).map(|d| -d).unwrap_or(i128::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyclescan_core::MS_PER_HOUR;

    const H: u64 = MS_PER_HOUR;

    fn snaps(points: &[(u64, u128)]) -> Vec<Snapshot> {
        points.iter().map(|&(t, b)| Snapshot::new(t, b)).collect()
    }

    fn wide() -> Window {
        Window::from_hours("wide", 1000).unwrap()
    }

    #[test]
    fn consecutive_pairs_only() {
        let series = build_intervals(&snaps(&[(0, 100), (H, 90), (2 * H, 80)]), &wide(), 2 * H);
        assert_eq!(series.intervals.len(), 2);
        assert_eq!(series.intervals[0].delta, -10);
        assert_eq!(series.intervals[1].duration, H);
        assert_eq!(series.actual_duration(), 2 * H);
        assert_eq!(series.net_change(), -20);
    }

    #[test]
    fn sorts_unordered_input() {
        let ordered = build_intervals(&snaps(&[(0, 100), (H, 90), (2 * H, 95)]), &wide(), 2 * H);
        let shuffled = build_intervals(&snaps(&[(2 * H, 95), (0, 100), (H, 90)]), &wide(), 2 * H);
        assert_eq!(ordered, shuffled);
    }

    #[test]
    fn duplicate_timestamps_keep_last_write() {
        let series = build_intervals(&snaps(&[(0, 100), (H, 70), (H, 90)]), &wide(), H);
        assert_eq!(series.snapshot_count, 2);
        assert_eq!(series.intervals.len(), 1);
        assert_eq!(series.intervals[0].delta, -10);
        assert_eq!(series.collapsed, 1);
    }

    #[test]
    fn fewer_than_two_snapshots_is_empty() {
        assert!(build_intervals(&[], &wide(), H).is_empty());
        let one = build_intervals(&snaps(&[(0, 100)]), &wide(), H);
        assert!(one.is_empty());
        assert_eq!(one.snapshot_count, 1);
    }

    #[test]
    fn window_excludes_old_and_future_snapshots() {
        let window = Window::from_hours("two", 2).unwrap();
        let now = 10 * H;
        let series = build_intervals(
            &snaps(&[(7 * H, 500), (8 * H, 400), (9 * H, 350), (11 * H, 1)]),
            &window,
            now,
        );
        assert_eq!(series.snapshot_count, 2);
        assert_eq!(series.intervals.len(), 1);
        assert_eq!(series.intervals[0].start_time, 8 * H);
    }

    #[test]
    fn classify_by_sign() {
        let flat = Interval {
            start_time: 0,
            end_time: 1,
            duration: 1,
            delta: 0,
        };
        assert_eq!(flat.classify(), IntervalKind::Consumption { amount: 0 });

        let down = Interval { delta: -25, ..flat };
        assert_eq!(down.classify(), IntervalKind::Consumption { amount: 25 });

        // No noise floor: a single-cycle increase is a top-up.
        let up = Interval { delta: 1, ..flat };
        assert_eq!(up.classify(), IntervalKind::Replenishment { amount: 1 });
    }

    #[test]
    fn large_balances_stay_exact() {
        let big = 400_000_000_000_000_000u128;
        let series = build_intervals(&snaps(&[(0, big), (H, big - 1)]), &wide(), H);
        assert_eq!(series.intervals[0].delta, -1);
    }
}
