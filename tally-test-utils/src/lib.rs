//! TALLY Test Utilities
//!
//! Shared test infrastructure for the TALLY workspace:
//! - Proptest generators for labels and label-sets
//! - Clock fixtures
//! - Test tracing setup

pub use tally_core::{Label, LabelSet, ManualClock, RegistryConfig};

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use tally_core::Clock;
use tracing_subscriber::EnvFilter;

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-writer `fmt` subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// CLOCK FIXTURES
// ============================================================================

/// A manual clock pinned to 2024-01-01T00:00:00Z.
pub fn fixed_clock() -> ManualClock {
    let start = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    ManualClock::new(start)
}

/// The same clock as a trait object, plus the handle used to drive it.
pub fn shared_clock() -> (Arc<dyn Clock>, ManualClock) {
    let clock = fixed_clock();
    (Arc::new(clock.clone()), clock)
}

// ============================================================================
// FIXTURES
// ============================================================================

/// `{__name__="cpu", host="a"}`
pub fn cpu_host_a() -> LabelSet {
    LabelSet::new().with("__name__", "cpu").with("host", "a")
}

/// A label-set with `n` plain dimensions `d0..d{n-1}`.
pub fn wide_set(n: usize) -> LabelSet {
    (0..n).map(|i| (format!("d{}", i), format!("v{}", i))).collect()
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Generate a label name (lowercase, may start with an underscore).
pub fn arb_label_name() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,11}"
        .prop_filter("reserved names", |n| n != "__name__" && n != "__ttl__")
}

/// Generate a label value.
pub fn arb_label_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9.:-]{1,16}"
}

/// Generate a single label.
pub fn arb_label() -> impl Strategy<Value = Label> {
    (arb_label_name(), arb_label_value()).prop_map(|(name, value)| Label::new(name, value))
}

/// Generate a non-empty label-set of up to `max` plain dimensions.
pub fn arb_label_set(max: usize) -> impl Strategy<Value = LabelSet> {
    prop::collection::btree_map(arb_label_name(), arb_label_value(), 1..=max.max(1))
        .prop_map(LabelSet::from_pairs)
}

/// Generate a label-set that also carries a metric name.
pub fn arb_metric_set(max: usize) -> impl Strategy<Value = LabelSet> {
    ("[a-z][a-z0-9_]{0,11}", arb_label_set(max))
        .prop_filter("metric name must not shadow a dimension", |(metric, set)| {
            !set.contains(metric)
        })
        .prop_map(|(metric, set)| set.with("__name__", metric))
}

/// Generate a positive TTL in seconds.
pub fn arb_ttl() -> impl Strategy<Value = i64> {
    1i64..=86_400
}
