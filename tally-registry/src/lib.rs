//! TALLY Registry - Freshness and Quorum Tables
//!
//! Two in-memory, TTL-bounded indices over label dimensions:
//!
//! - [`FreshnessTable`]: the earliest expiry per dimension name; answers
//!   "is every dimension of this set still fresh?"
//! - [`QuorumTable`]: per-dimension buckets of announced label-set hashes;
//!   answers "has some announced set been corroborated under every one of
//!   its dimensions?"
//!
//! Each table is guarded by a single `RwLock`. Checks share the read lock;
//! sets and cleanups take the write lock. Expired entries are treated as
//! absent immediately and physically removed by cleanup, which the quorum
//! table triggers itself every N checks and the [`sweeper`] runs on a timer.

pub mod cleanup;
pub mod freshness;
pub mod quorum;
pub mod registry;
pub mod sweeper;

pub use cleanup::CleanupReport;
pub use freshness::FreshnessTable;
pub use quorum::{QuorumTable, Subscription};
pub use registry::{LabelRegistry, RegistrySweep};
pub use sweeper::{spawn_sweeper, sweep_task, SweepMetrics, SweepMetricsSnapshot};
