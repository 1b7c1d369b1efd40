//! Property tests for the edit-script diff.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use sprig_core::{Edit, EditStats, Element, VTree, apply_edits, diff_array};

fn lcs_len(a: &[u8], b: &[u8]) -> usize {
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            table[i][j] = if a[i - 1] == b[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }
    table[a.len()][b.len()]
}

fn keyed(keys: &[u8]) -> Vec<VTree> {
    keys.iter()
        .map(|k| Element::build("li").key(k.to_string()).finish())
        .collect()
}

fn script_names(old: &[u8], new: &[u8]) -> Vec<&'static str> {
    diff_array(&keyed(old), &keyed(new), VTree::key_eq)
        .iter()
        .map(|edit| edit.name())
        .collect()
}

#[test]
fn keyed_rotation_reinserts_the_moved_key() {
    assert_eq!(
        script_names(&[1, 2, 3], &[3, 1, 2]),
        ["insert", "merge", "merge", "delete"]
    );
}

#[test]
fn keyed_swap_keeps_one_side() {
    assert_eq!(
        script_names(&[1, 2], &[2, 1]),
        ["delete", "merge", "insert"]
    );
}

proptest! {
    #[test]
    fn replay_reproduces_target(
        a in prop::collection::vec(0u8..6, 0..24),
        b in prop::collection::vec(0u8..6, 0..24),
    ) {
        let edits = diff_array(&a, &b, |x, y| x == y);
        prop_assert_eq!(apply_edits(&a, &edits), b);
    }

    #[test]
    fn script_is_minimal(
        a in prop::collection::vec(0u8..4, 0..16),
        b in prop::collection::vec(0u8..4, 0..16),
    ) {
        let edits = diff_array(&a, &b, |x, y| x == y);
        let stats = EditStats::of(&edits);
        let lcs = lcs_len(&a, &b);
        prop_assert_eq!(stats.merges, lcs);
        prop_assert_eq!(stats.merges + stats.deletes, a.len());
        prop_assert_eq!(stats.merges + stats.inserts, b.len());
    }

    #[test]
    fn merges_only_pair_equal_elements(
        a in prop::collection::vec(0u8..5, 0..20),
        b in prop::collection::vec(0u8..5, 0..20),
    ) {
        for edit in diff_array(&a, &b, |x, y| x == y) {
            if let Edit::Merge(x, y) = edit {
                prop_assert_eq!(x, y);
            }
        }
    }

    #[test]
    fn identical_keyed_lists_only_merge(keys in prop::collection::vec(any::<u8>(), 0..32)) {
        let old = keyed(&keys);
        let new = keyed(&keys);
        let stats = EditStats::of(&diff_array(&old, &new, VTree::key_eq));
        prop_assert!(stats.is_identity());
        prop_assert_eq!(stats.merges, keys.len());
    }
}
