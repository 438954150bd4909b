//! cyclescan-estimator — top-up aware burn rates and runway projection.
//!
//! Turns raw balance snapshots into per-window consumption rates,
//! projects how long a balance lasts, and sums entities into groups.
//!
//! # Rate Algorithm
//!
//! ```text
//! intervals      = consecutive snapshot pairs inside [now - window, now]
//! consumption    = intervals with delta <= 0
//! replenishment  = intervals with delta > 0
//!
//! pass 1:  consumed        = sum(-delta) over consumption
//!          consumption_ms  = sum(duration) over consumption
//!          replenishment_ms = sum(duration) over replenishment
//! pass 2:  inferred        = consumed * replenishment_ms / consumption_ms
//!
//! rate = (consumed + inferred) * hour / (consumption_ms + replenishment_ms)
//! ```
//!
//! A top-up's positive delta never cancels consumption: the cycles burned
//! while the top-up landed are filled in at the rate observed elsewhere.
//!
//! # Architecture
//!
//! ```text
//! Engine<S: SnapshotSource>
//!   ├── estimate_rate()    → RateOutcome per window
//!   ├── estimate_runway()  → RunwayEstimate (longest window with burn)
//!   ├── entity_report()    → EntityReport
//!   ├── aggregate()        → GroupAggregate (valid members by default)
//!   └── estimate_many()    → reports across the blocking pool
//!
//! EstimateCache
//!   └── reports keyed by (data_version, now)
//! ```

pub mod aggregate;
pub mod cache;
pub mod engine;
pub mod error;
pub mod interval;
pub mod rate;
pub mod runway;

pub use aggregate::{AggregateView, GroupAggregate, MemberEstimate, aggregate};
pub use cache::{CacheKey, EstimateCache};
pub use engine::{Engine, EntityReport};
pub use error::{EstimateError, EstimateResult};
pub use interval::{Interval, IntervalKind, IntervalSeries, build_intervals};
pub use rate::{RateBasis, RateEstimate, RateOutcome, estimate_window};
pub use runway::{RunwayEstimate, RunwayPolicy, Severity, days_until_empty};
