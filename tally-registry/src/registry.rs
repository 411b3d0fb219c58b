//! The registry facade owning both tables.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tally_core::{Clock, LabelSet, RegistryConfig, SystemClock, TallyResult};

use crate::cleanup::CleanupReport;
use crate::freshness::FreshnessTable;
use crate::quorum::QuorumTable;

/// Reports from one sweep of both tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySweep {
    pub freshness: CleanupReport,
    pub quorum: CleanupReport,
}

impl RegistrySweep {
    /// Expired entries removed across both tables.
    pub fn total_deleted(&self) -> usize {
        self.freshness.deleted + self.quorum.deleted
    }
}

/// A freshness table and a quorum table sharing one clock and config.
///
/// Producers call [`observe`](Self::observe) or [`announce`](Self::announce);
/// consumers gate results on [`is_corroborated`](Self::is_corroborated),
/// [`is_fresh`](Self::is_fresh) or both via [`admit`](Self::admit).
#[derive(Debug, Clone)]
pub struct LabelRegistry {
    freshness: FreshnessTable,
    quorum: QuorumTable,
    config: RegistryConfig,
}

impl LabelRegistry {
    /// Create a registry after validating `config`.
    pub fn new(config: RegistryConfig, clock: Arc<dyn Clock>) -> TallyResult<Self> {
        config.validate()?;
        Ok(Self {
            freshness: FreshnessTable::with_clock(Arc::clone(&clock)),
            quorum: QuorumTable::new(&config, clock),
            config,
        })
    }

    /// Create a registry from `TALLY_*` environment variables on the system
    /// clock.
    pub fn from_env() -> TallyResult<Self> {
        Self::new(RegistryConfig::from_env(), Arc::new(SystemClock))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn freshness(&self) -> &FreshnessTable {
        &self.freshness
    }

    pub fn quorum(&self) -> &QuorumTable {
        &self.quorum
    }

    /// Record an observation in both tables, using the set's own TTL.
    pub fn observe(&self, labels: &LabelSet) -> TallyResult<()> {
        self.freshness.set(labels)?;
        self.quorum.set_default(labels)
    }

    /// Announce a label-set for quorum tracking only.
    pub fn announce(&self, labels: &LabelSet, ttl_secs: i64) -> TallyResult<()> {
        self.quorum.set(labels, ttl_secs)
    }

    /// Whether some announced set is fully corroborated by `labels`.
    pub fn is_corroborated(&self, labels: &LabelSet) -> TallyResult<bool> {
        self.quorum.check(labels)
    }

    /// Whether every dimension name of `labels` is still fresh.
    pub fn is_fresh(&self, labels: &LabelSet) -> TallyResult<bool> {
        self.freshness.check(labels)
    }

    /// Corroborated and fresh.
    pub fn admit(&self, labels: &LabelSet) -> TallyResult<bool> {
        Ok(self.quorum.check(labels)? && self.freshness.check(labels)?)
    }

    /// Sweep expired entries from both tables.
    pub fn cleanup(&self) -> TallyResult<RegistrySweep> {
        Ok(RegistrySweep {
            freshness: self.freshness.cleanup()?,
            quorum: self.quorum.cleanup()?,
        })
    }
}
