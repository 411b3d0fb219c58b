//! Constants for TALLY
//!
//! Reserved label names, defaults, and environment variable names.

// ============================================================================
// RESERVED LABELS
// ============================================================================

/// Label carrying the metric's name. Bucketed by value, not by name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Label through which a label-set declares its own TTL in seconds.
pub const TTL_LABEL: &str = "__ttl__";

/// Label holding a scrape target's `host:port`.
pub const INSTANCE_LABEL: &str = "instance";

/// Byte written after every name and value when hashing a label-set.
pub const LABEL_SEPARATOR: u8 = 0xFF;

// ============================================================================
// REGISTRY DEFAULTS
// ============================================================================

/// Default TTL substituted for a non-positive one (~68 years).
pub const UNBOUNDED_TTL_SECS: i64 = i32::MAX as i64;

/// Default TTL for quorum subscriptions (unbounded).
pub const DEFAULT_QUORUM_TTL_SECS: i64 = UNBOUNDED_TTL_SECS;

/// Number of quorum checks between count-triggered cleanups.
pub const DEFAULT_CLEANUP_EVERY_CHECKS: u64 = 10_000;

/// Interval of the periodic sweeper task in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

// ============================================================================
// ENRICHMENT
// ============================================================================

/// How long a resolved address keeps its labels before re-resolution.
pub const DEFAULT_ENRICH_MEMO_TTL_MS: u64 = 5_000;

// ============================================================================
// ENVIRONMENT
// ============================================================================

pub const ENV_DEFAULT_TTL_SECS: &str = "TALLY_DEFAULT_TTL_SECS";
pub const ENV_CLEANUP_EVERY_CHECKS: &str = "TALLY_CLEANUP_EVERY_CHECKS";
pub const ENV_SWEEP_INTERVAL_SECS: &str = "TALLY_SWEEP_INTERVAL_SECS";
pub const ENV_ENRICH_MEMO_TTL_MS: &str = "TALLY_ENRICH_MEMO_TTL_MS";
