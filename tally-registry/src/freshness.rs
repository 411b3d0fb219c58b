//! Freshness table: the earliest expiry per dimension name.
//!
//! A label-set opts in by declaring a positive TTL. Each of its dimension
//! names then records `now + ttl`, unless an earlier live expiry is already
//! on record. The tightest window always wins and is never relaxed by a later,
//! looser registration.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tally_core::{
    expiry_after, is_live, Clock, LabelSet, RegistryError, SystemClock, TallyResult, Timestamp,
};

use crate::cleanup::CleanupReport;

const TABLE: &str = "freshness";

/// Per-name minimum expiry index.
#[derive(Debug, Clone)]
pub struct FreshnessTable {
    entries: Arc<RwLock<HashMap<String, Timestamp>>>,
    clock: Arc<dyn Clock>,
}

impl FreshnessTable {
    /// Create an empty table on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty table reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    fn read(&self) -> TallyResult<RwLockReadGuard<'_, HashMap<String, Timestamp>>> {
        self.entries
            .read()
            .map_err(|_| RegistryError::LockPoisoned { table: TABLE }.into())
    }

    fn write(&self) -> TallyResult<RwLockWriteGuard<'_, HashMap<String, Timestamp>>> {
        self.entries
            .write()
            .map_err(|_| RegistryError::LockPoisoned { table: TABLE }.into())
    }

    /// Register the label-set's self-declared TTL against each of its names.
    ///
    /// A non-positive TTL is a no-op. Names without a live entry are
    /// recorded, whether absent or expired but not yet swept. Live entries
    /// with a later expiry are narrowed; live entries with an earlier or
    /// equal expiry are left alone.
    pub fn set(&self, labels: &LabelSet) -> TallyResult<()> {
        let ttl = labels.ttl();
        if ttl <= 0 {
            return Ok(());
        }
        let now = self.clock.now();
        let expiry = expiry_after(now, ttl);

        let mut entries = self.write()?;
        for name in labels.names() {
            match entries.get_mut(name) {
                Some(existing) if is_live(*existing, now) => {
                    if *existing > expiry {
                        *existing = expiry;
                    }
                }
                Some(existing) => *existing = expiry,
                None => {
                    entries.insert(name.to_string(), expiry);
                }
            }
        }
        Ok(())
    }

    /// True iff every name of `labels` has a live entry.
    ///
    /// An empty label-set has no stale dimension and is reported fresh.
    pub fn check(&self, labels: &LabelSet) -> TallyResult<bool> {
        let now = self.clock.now();
        let entries = self.read()?;
        Ok(labels
            .names()
            .all(|name| entries.get(name).is_some_and(|expiry| is_live(*expiry, now))))
    }

    /// Remove every entry that has expired.
    pub fn cleanup(&self) -> TallyResult<CleanupReport> {
        let now = self.clock.now();
        let mut entries = self.write()?;

        let scanned = entries.len();
        entries.retain(|_, expiry| is_live(*expiry, now));
        let report = CleanupReport {
            scanned,
            deleted: scanned - entries.len(),
            buckets_removed: 0,
        };
        drop(entries);

        tracing::debug!(
            scanned = report.scanned,
            deleted = report.deleted,
            "Cleaned up freshness table"
        );
        Ok(report)
    }

    /// The recorded expiry for a dimension name, expired or not.
    pub fn expiry_of(&self, name: &str) -> TallyResult<Option<Timestamp>> {
        Ok(self.read()?.get(name).copied())
    }

    /// Number of names on record, including expired ones not yet swept.
    pub fn len(&self) -> TallyResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> TallyResult<bool> {
        Ok(self.read()?.is_empty())
    }
}

impl Default for FreshnessTable {
    fn default() -> Self {
        Self::new()
    }
}
