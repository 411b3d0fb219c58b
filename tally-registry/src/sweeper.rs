//! Periodic Sweeper Background Task
//!
//! Sweeps both tables of a [`LabelRegistry`] on a fixed interval. This runs
//! alongside the count-triggered cleanup inside `QuorumTable::check`; it
//! bounds memory when checks are rare and is the only sweeper the freshness
//! table has.
//!
//! # Example
//!
//! ```rust,ignore
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let handle = tokio::spawn(sweep_task(registry.clone(), Duration::from_secs(60), shutdown_rx));
//!
//! // Later
//! let _ = shutdown_tx.send(true);
//! let metrics = handle.await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::registry::LabelRegistry;

// ============================================================================
// METRICS
// ============================================================================

/// Counters accumulated by the sweeper task.
#[derive(Debug, Default)]
pub struct SweepMetrics {
    /// Completed sweep cycles.
    pub sweeps: AtomicU64,
    /// Freshness entries removed.
    pub freshness_deleted: AtomicU64,
    /// Quorum registrations removed.
    pub quorum_deleted: AtomicU64,
    /// Sweeps that failed.
    pub sweep_errors: AtomicU64,
}

impl SweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SweepMetricsSnapshot {
        SweepMetricsSnapshot {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            freshness_deleted: self.freshness_deleted.load(Ordering::Relaxed),
            quorum_deleted: self.quorum_deleted.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SweepMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepMetricsSnapshot {
    pub sweeps: u64,
    pub freshness_deleted: u64,
    pub quorum_deleted: u64,
    pub sweep_errors: u64,
}

// ============================================================================
// TASK
// ============================================================================

/// Sweep `registry` every `every` until `shutdown_rx` reads `true`.
///
/// Returns the accumulated metrics once shut down.
pub async fn sweep_task(
    registry: Arc<LabelRegistry>,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<SweepMetrics> {
    let metrics = Arc::new(SweepMetrics::new());

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_ms = every.as_millis() as u64,
        "Registry sweeper started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Registry sweeper shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                sweep_once(&registry, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        sweeps = snapshot.sweeps,
        freshness_deleted = snapshot.freshness_deleted,
        quorum_deleted = snapshot.quorum_deleted,
        sweep_errors = snapshot.sweep_errors,
        "Registry sweeper completed"
    );

    metrics
}

/// Spawn [`sweep_task`] on the current runtime with the registry's
/// configured interval.
pub fn spawn_sweeper(
    registry: Arc<LabelRegistry>,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<Arc<SweepMetrics>> {
    let every = registry.config().sweep_interval;
    tokio::spawn(sweep_task(registry, every, shutdown_rx))
}

/// Perform one sweep cycle off the async worker threads.
async fn sweep_once(registry: &Arc<LabelRegistry>, metrics: &SweepMetrics) {
    let target = Arc::clone(registry);
    let outcome = tokio::task::spawn_blocking(move || target.cleanup()).await;

    match outcome {
        Ok(Ok(sweep)) => {
            metrics.sweeps.fetch_add(1, Ordering::Relaxed);
            metrics
                .freshness_deleted
                .fetch_add(sweep.freshness.deleted as u64, Ordering::Relaxed);
            metrics
                .quorum_deleted
                .fetch_add(sweep.quorum.deleted as u64, Ordering::Relaxed);

            if sweep.total_deleted() > 0 {
                tracing::debug!(
                    freshness_deleted = sweep.freshness.deleted,
                    quorum_deleted = sweep.quorum.deleted,
                    "Registry sweep completed"
                );
            } else {
                tracing::trace!("Registry sweep completed with nothing expired");
            }
        }
        Ok(Err(e)) => {
            metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Registry sweep failed");
        }
        Err(e) => {
            metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Registry sweep task panicked");
        }
    }
}
