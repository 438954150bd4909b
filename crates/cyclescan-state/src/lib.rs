//! cyclescan-state — embedded snapshot store for CycleScan.
//!
//! Backed by [redb](https://docs.rs/redb), holds the entity registry and
//! every balance snapshot, on disk or in memory.
//!
//! # Architecture
//!
//! Entity metadata and snapshots are JSON-serialized into redb's `&[u8]`
//! value columns. Snapshot keys are `{entity_id}:{timestamp:020}`, so a
//! range scan over one entity's keys returns its history oldest first.
//!
//! Every write bumps a `data_version` counter; readers that memoize
//! estimates compare it to decide whether their results are stale.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and implements `SnapshotSource`, so the estimator reads it directly.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
