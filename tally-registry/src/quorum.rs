//! Quorum table: cross-dimensional corroboration of announced label-sets.
//!
//! `set` fans a label-set's content hash out into one bucket per dimension,
//! each copy carrying the set's dimension count (`denom`) and an expiry.
//! `check` rebuilds per-hash counts from the buckets the query carries; a hash
//! whose count reaches its `denom` has been seen under every one of its
//! original dimensions.
//!
//! ```text
//! set({__name__="cpu", host="a"})      buckets
//!                                      "cpu"  -> {h1: denom 2}
//!                                      "host" -> {h1: denom 2}
//!
//! check({__name__="cpu", host="a"})    h1 seen twice, 2 >= 2 -> true
//! check({host="a"})                    h1 seen once,  1 <  2 -> false
//! ```
//!
//! Every `cleanup_every_checks` calls, `check` launches a cleanup without
//! waiting for it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tally_core::{
    expiry_after, is_live, Clock, LabelSet, RegistryConfig, RegistryError, SystemClock,
    TallyResult, Timestamp,
};

use crate::cleanup::{spawn_detached, CleanupReport};

const TABLE: &str = "quorum";

type Bucket = HashMap<u64, Subscription>;

/// A pending registration of one label-set under one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    /// Dimension count of the registering label-set.
    pub denom: usize,
    /// When this registration stops counting.
    pub expiry: Timestamp,
}

#[derive(Debug, Clone, Copy)]
struct Tally {
    denom: usize,
    actives: usize,
}

#[derive(Debug, Default)]
struct Shared {
    buckets: RwLock<HashMap<String, Bucket>>,
    checks: AtomicU64,
    cleanup_in_flight: AtomicBool,
}

/// Clears `cleanup_in_flight` when dropped.
struct InFlightGuard(Arc<Shared>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.cleanup_in_flight.store(false, Ordering::Release);
    }
}

/// Bucketed quorum index.
///
/// Clones share the same underlying table.
#[derive(Debug, Clone)]
pub struct QuorumTable {
    shared: Arc<Shared>,
    clock: Arc<dyn Clock>,
    default_ttl_secs: i64,
    cleanup_every_checks: u64,
}

impl QuorumTable {
    /// Create an empty table from `config`, reading time from `clock`.
    pub fn new(config: &RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        let default_ttl_secs = config.effective_default_ttl();
        let cleanup_every_checks = config.cleanup_every_checks.max(1);

        tracing::info!(
            default_ttl_secs,
            cleanup_every_checks,
            "Created quorum table"
        );

        Self {
            shared: Arc::new(Shared::default()),
            clock,
            default_ttl_secs,
            cleanup_every_checks,
        }
    }

    /// Create an empty table on the system clock with the given default TTL.
    pub fn with_default_ttl(default_ttl_secs: i64) -> Self {
        Self::new(
            &RegistryConfig::new().with_default_ttl(default_ttl_secs),
            Arc::new(SystemClock),
        )
    }

    fn read(&self) -> TallyResult<RwLockReadGuard<'_, HashMap<String, Bucket>>> {
        self.shared
            .buckets
            .read()
            .map_err(|_| RegistryError::LockPoisoned { table: TABLE }.into())
    }

    fn write(&self) -> TallyResult<RwLockWriteGuard<'_, HashMap<String, Bucket>>> {
        self.shared
            .buckets
            .write()
            .map_err(|_| RegistryError::LockPoisoned { table: TABLE }.into())
    }

    /// The default TTL in seconds, after coercion of non-positive values.
    pub fn default_ttl_secs(&self) -> i64 {
        self.default_ttl_secs
    }

    /// Announce `labels` for `ttl_secs` seconds.
    ///
    /// A non-positive TTL falls back to the table default. An empty set
    /// registers nothing. An existing registration of the same set with a
    /// later expiry is kept.
    pub fn set(&self, labels: &LabelSet, ttl_secs: i64) -> TallyResult<()> {
        if labels.is_empty() {
            return Ok(());
        }
        let ttl_secs = if ttl_secs > 0 {
            ttl_secs
        } else {
            self.default_ttl_secs
        };

        let hash = labels.content_hash();
        let sub = Subscription {
            denom: labels.len(),
            expiry: expiry_after(self.clock.now(), ttl_secs),
        };

        let mut buckets = self.write()?;
        for key in labels.dimension_keys() {
            let bucket = buckets.entry(key.to_string()).or_default();
            match bucket.get(&hash) {
                Some(existing) if existing.expiry > sub.expiry => {}
                _ => {
                    bucket.insert(hash, sub);
                }
            }
        }
        Ok(())
    }

    /// Announce `labels` using its own TTL, or the table default when the
    /// set declares none.
    pub fn set_default(&self, labels: &LabelSet) -> TallyResult<()> {
        self.set(labels, labels.ttl())
    }

    /// True iff some announced label-set has a live registration under every
    /// one of its dimensions among the buckets `labels` maps to.
    ///
    /// An empty query never reaches quorum.
    pub fn check(&self, labels: &LabelSet) -> TallyResult<bool> {
        self.record_check();

        if labels.is_empty() {
            return Ok(false);
        }
        let now = self.clock.now();
        let buckets = self.read()?;

        let mut tallies: HashMap<u64, Tally> = HashMap::new();
        for key in labels.dimension_keys() {
            let Some(bucket) = buckets.get(key) else {
                continue;
            };
            for (hash, sub) in bucket {
                if !is_live(sub.expiry, now) {
                    continue;
                }
                tallies
                    .entry(*hash)
                    .and_modify(|t| t.actives += 1)
                    .or_insert(Tally {
                        denom: sub.denom,
                        actives: 1,
                    });
            }
        }

        Ok(tallies.values().any(|t| t.actives >= t.denom))
    }

    fn record_check(&self) {
        let seen = self.shared.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % self.cleanup_every_checks != 0 {
            return;
        }
        if self.shared.cleanup_in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!(checks = seen, "Quorum cleanup already running");
            return;
        }

        // Dropped with the closure, whether it ran, unwound or never started
        let in_flight = InFlightGuard(Arc::clone(&self.shared));
        let table = self.clone();
        let launched = spawn_detached(move || {
            let _in_flight = in_flight;
            if let Err(e) = table.cleanup() {
                tracing::error!(error = %e, "Triggered quorum cleanup failed");
            }
        });

        if let Err(e) = launched {
            tracing::error!(error = %e, "Failed to launch quorum cleanup");
        }
    }

    /// Remove expired registrations and any bucket left empty.
    pub fn cleanup(&self) -> TallyResult<CleanupReport> {
        let now = self.clock.now();
        let mut report = CleanupReport::default();

        let mut buckets = self.write()?;
        buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|_, sub| is_live(sub.expiry, now));
            report.scanned += before;
            report.deleted += before - bucket.len();
            if bucket.is_empty() {
                report.buckets_removed += 1;
                false
            } else {
                true
            }
        });
        drop(buckets);

        tracing::info!(
            count = report.scanned,
            deleted = report.deleted,
            buckets_removed = report.buckets_removed,
            "Cleaned up quorum table"
        );
        Ok(report)
    }

    /// The registration of `hash` under bucket `key`, expired or not.
    pub fn subscription(&self, key: &str, hash: u64) -> TallyResult<Option<Subscription>> {
        Ok(self
            .read()?
            .get(key)
            .and_then(|bucket| bucket.get(&hash))
            .copied())
    }

    /// Number of buckets currently held.
    pub fn bucket_count(&self) -> TallyResult<usize> {
        Ok(self.read()?.len())
    }

    /// Number of registrations across all buckets.
    pub fn entry_count(&self) -> TallyResult<usize> {
        Ok(self.read()?.values().map(HashMap::len).sum())
    }

    /// Total `check` calls observed.
    pub fn checks_observed(&self) -> u64 {
        self.shared.checks.load(Ordering::Relaxed)
    }
}
