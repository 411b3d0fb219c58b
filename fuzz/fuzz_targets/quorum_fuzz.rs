//! Fuzz test for the quorum table
//!
//! Builds label-sets from arbitrary bytes and checks that:
//! - A set announced with a positive TTL corroborates itself
//! - Dropping any one dimension never reaches quorum
//! - Cleanup after expiry empties the table
//!
//! Run with: cargo +nightly fuzz run quorum_fuzz -- -max_total_time=60

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use tally_core::{LabelSet, ManualClock, RegistryConfig};
use tally_registry::QuorumTable;

fn label_set(bytes: &[u8]) -> LabelSet {
    bytes
        .chunks(2)
        .map(|pair| {
            let name = format!("d{}", pair[0] % 16);
            let value = format!("v{}", pair.get(1).copied().unwrap_or(0) % 4);
            (name, value)
        })
        .collect()
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let ttl = i64::from(data[0] % 120) + 1;
    let set = label_set(&data[1..]);

    let clock = ManualClock::starting_now();
    let table = QuorumTable::new(&RegistryConfig::default(), Arc::new(clock.clone()));
    table.set(&set, ttl).expect("set");
    assert!(table.check(&set).expect("check"));

    for skip in 0..set.len() {
        let subset: LabelSet = set
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, pair)| pair)
            .collect();
        assert!(!table.check(&subset).expect("check subset"));
    }

    clock.advance_secs(ttl);
    assert!(!table.check(&set).expect("check expired"));
    table.cleanup().expect("cleanup");
    assert_eq!(table.entry_count().expect("count"), 0);
    assert_eq!(table.bucket_count().expect("count"), 0);
});
