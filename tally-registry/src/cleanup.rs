//! Cleanup reports and detached cleanup launch.

use serde::{Deserialize, Serialize};
use tally_core::{RegistryError, TallyResult};

/// Outcome of one cleanup pass over a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Entries examined.
    pub scanned: usize,
    /// Expired entries removed.
    pub deleted: usize,
    /// Buckets dropped because they became empty.
    pub buckets_removed: usize,
}

impl CleanupReport {
    /// Entries left after the pass.
    pub fn retained(&self) -> usize {
        self.scanned - self.deleted
    }
}

/// Run `task` without waiting for it.
///
/// Uses the blocking pool of the current tokio runtime when there is one,
/// otherwise a dedicated OS thread.
pub(crate) fn spawn_detached<F>(task: F) -> TallyResult<()>
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            drop(handle.spawn_blocking(task));
            Ok(())
        }
        Err(_) => std::thread::Builder::new()
            .name("tally-cleanup".to_string())
            .spawn(task)
            .map(drop)
            .map_err(|e| {
                RegistryError::CleanupSpawnFailed {
                    reason: e.to_string(),
                }
                .into()
            }),
    }
}
