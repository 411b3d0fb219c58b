//! Fuzz test for label-set text parsing
//!
//! Arbitrary input must parse or fail without panicking, and whatever
//! parses must print back to a form that parses to the same set.
//!
//! Run with: cargo +nightly fuzz run labelset_parse_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use tally_core::LabelSet;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(set) = input.parse::<LabelSet>() else {
        return;
    };

    let reparsed: LabelSet = set.to_string().parse().expect("printed set parses");
    assert_eq!(reparsed, set);
});
