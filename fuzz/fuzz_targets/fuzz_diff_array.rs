#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sprig_core::{EditStats, apply_edits, diff_array};

const MAX_LEN: usize = 64;

#[derive(Debug, Arbitrary)]
struct Input {
    old: Vec<u8>,
    new: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let old: Vec<u8> = input.old.into_iter().take(MAX_LEN).map(|b| b % 8).collect();
    let new: Vec<u8> = input.new.into_iter().take(MAX_LEN).map(|b| b % 8).collect();

    let edits = diff_array(&old, &new, |a, b| a == b);
    assert_eq!(apply_edits(&old, &edits), new);

    let stats = EditStats::of(&edits);
    assert_eq!(stats.merges + stats.deletes, old.len());
    assert_eq!(stats.merges + stats.inserts, new.len());
});
