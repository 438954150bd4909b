//! Top-up aware consumption rate estimation.
//!
//! # Algorithm
//!
//! ```text
//! pass 1: split intervals into consumption (Δ ≤ 0) and replenishment (Δ > 0)
//!         avg = Σconsumed / Σconsumption_duration        (if duration > 0)
//! pass 2: inferred = avg × Σreplenishment_duration
//! rate  = (Σconsumed + inferred) / Σall_durations        (per hour)
//! ```
//!
//! A top-up hides whatever was burned during its interval. Rather than
//! counting that interval as zero burn (which drags the rate down) or as
//! negative burn, the burn it hid is inferred from the rate observed in the
//! intervals around it.
//!
//! Everything is integer arithmetic on `u128` with floor division.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cyclescan_core::{MS_PER_DAY, MS_PER_HOUR, Snapshot, Window};

use crate::interval::{IntervalKind, IntervalSeries, build_intervals};

/// How much the estimate can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBasis {
    /// At least one consumption interval was observed.
    Measured,
    /// Every interval was a top-up. `rate` is zero because nothing could be
    /// measured, not because nothing was burned.
    NoConsumptionBasis,
}

/// Consumption estimate for one entity over one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateEstimate {
    pub window: Window,
    /// Consumption per hour, top-up intervals included via inference.
    pub rate: u128,
    /// Consumption per hour over consumption intervals only. `None` when
    /// the window holds no consumption interval.
    pub net_rate: Option<u128>,
    /// Number of intervals that fed the estimate.
    pub sample_count: usize,
    pub snapshot_count: usize,
    /// Oldest-to-newest span of the snapshots inside the window (ms).
    pub actual_duration: u64,
    pub replenishment_count: usize,
    pub total_replenished: u128,
    /// Burn observed directly in consumption intervals.
    pub consumed: u128,
    /// Burn inferred for replenishment intervals.
    pub inferred: u128,
    /// Last balance minus first balance. Positive means the balance grew.
    pub net_change: i128,
    pub first_timestamp: u64,
    pub last_timestamp: u64,
}

impl RateEstimate {
    pub fn basis(&self) -> RateBasis {
        if self.net_rate.is_some() {
            RateBasis::Measured
        } else {
            RateBasis::NoConsumptionBasis
        }
    }

    pub fn total_consumption(&self) -> u128 {
        self.consumed.saturating_add(self.inferred)
    }

    /// Display helper for callers; the canonical figure stays per hour.
    pub fn per_day(&self) -> u128 {
        self.rate.saturating_mul(24)
    }

    /// Whether the window's data covers less than half its nominal span.
    pub fn is_underfilled(&self) -> bool {
        self.actual_duration < self.window.span_ms / 2
    }
}

/// Result of estimating one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateOutcome {
    /// Fewer than two usable snapshots. Distinct from a confirmed zero.
    InsufficientData { window: Window, snapshots: usize },
    Estimated(RateEstimate),
}

impl RateOutcome {
    pub fn window(&self) -> &Window {
        match self {
            RateOutcome::InsufficientData { window, .. } => window,
            RateOutcome::Estimated(estimate) => &estimate.window,
        }
    }

    pub fn estimate(&self) -> Option<&RateEstimate> {
        match self {
            RateOutcome::Estimated(estimate) => Some(estimate),
            RateOutcome::InsufficientData { .. } => None,
        }
    }

    pub fn rate(&self) -> Option<u128> {
        self.estimate().map(|e| e.rate)
    }
}

/// Estimate the rate for `window` directly from raw snapshots.
pub fn estimate_window(snapshots: &[Snapshot], window: &Window, now_ms: u64) -> RateOutcome {
    let series = build_intervals(snapshots, window, now_ms);
    estimate(&series, window)
}

/// Two-pass estimate over an already built interval series.
pub fn estimate(series: &IntervalSeries, window: &Window) -> RateOutcome {
    let (Some(first), Some(last)) = (series.first, series.last) else {
        return insufficient(series, window);
    };
    if series.is_empty() {
        return insufficient(series, window);
    }

    // Pass 1: partition.
    let mut consumed: u128 = 0;
    let mut consumption_ms: u128 = 0;
    let mut total_replenished: u128 = 0;
    let mut replenishment_ms: u128 = 0;
    let mut replenishment_count = 0usize;
    for interval in &series.intervals {
        match interval.classify() {
            IntervalKind::Consumption { amount } => {
                consumed = consumed.saturating_add(amount);
                consumption_ms += interval.duration as u128;
            }
            IntervalKind::Replenishment { amount } => {
                total_replenished = total_replenished.saturating_add(amount);
                replenishment_ms += interval.duration as u128;
                replenishment_count += 1;
            }
        }
    }

    let total_ms: u128 = series.intervals.iter().map(|i| i.duration as u128).sum();
    if total_ms == 0 {
        return insufficient(series, window);
    }

    // Pass 2: infer the burn the top-up intervals hid. One division over
    // their summed duration, so flooring happens once per window.
    let inferred: u128 = if consumption_ms > 0 {
        mul_div(consumed, replenishment_ms, consumption_ms)
    } else {
        0
    };

    let hour = MS_PER_HOUR as u128;
    let total = consumed.saturating_add(inferred);
    let rate = mul_div(total, hour, total_ms);
    let net_rate = (consumption_ms > 0).then(|| mul_div(consumed, hour, consumption_ms));

    let estimate = RateEstimate {
        window: window.clone(),
        rate,
        net_rate,
        sample_count: series.intervals.len(),
        snapshot_count: series.snapshot_count,
        actual_duration: series.actual_duration(),
        replenishment_count,
        total_replenished,
        consumed,
        inferred,
        net_change: series.net_change(),
        first_timestamp: first.timestamp,
        last_timestamp: last.timestamp,
    };

    debug!(
        window = %window.name,
        rate,
        samples = estimate.sample_count,
        replenishments = estimate.replenishment_count,
        basis = ?estimate.basis(),
        "rate estimated"
    );
    RateOutcome::Estimated(estimate)
}

fn insufficient(series: &IntervalSeries, window: &Window) -> RateOutcome {
    RateOutcome::InsufficientData {
        window: window.clone(),
        snapshots: series.snapshot_count,
    }
}

/// `a * b / c` with floor division, falling back to a split computation
/// when the product does not fit in `u128`.
pub(crate) fn mul_div(a: u128, b: u128, c: u128) -> u128 {
    debug_assert!(c > 0);
    match a.checked_mul(b) {
        Some(product) => product / c,
        None => {
            warn!(a, b, c, "rate arithmetic overflowed u128, splitting division");
            let whole = (a / c).saturating_mul(b);
            let part = (a % c).checked_mul(b).map_or(u128::MAX, |p| p / c);
            whole.saturating_add(part)
        }
    }
}

/// Per-hour rate expressed per day, for callers that display daily burn.
pub fn per_day(rate_per_hour: u128) -> u128 {
    mul_div(rate_per_hour, MS_PER_DAY as u128, MS_PER_HOUR as u128)
}
