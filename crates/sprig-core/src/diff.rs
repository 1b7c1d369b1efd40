#![forbid(unsafe_code)]

//! Edit-script diff between two ordered sequences.
//!
//! [`diff_array`] computes the ordered list of [`Edit`] operations that turns
//! sequence `a` into sequence `b`, matching elements only through a
//! caller-supplied equality predicate. The patcher runs it over sibling lists
//! with key equality, so structural content never participates in matching.
//!
//! # Algorithm
//!
//! Minimum edit cost over a `(|a|+1) × (|b|+1)` table:
//!
//! ```text
//! t[i][0] = i
//! t[0][j] = j
//! t[i][j] = t[i-1][j-1]                         if eq(a[i-1], b[j-1])
//!         = 1 + min(t[i-1][j], t[i][j-1])       otherwise
//! ```
//!
//! Backtracking starts at `(|a|, |b|)`. A position where `eq` holds always
//! yields a `Merge`. Otherwise the walk steps to the cheaper neighbour,
//! emitting `Insert` (left) or `Delete` (up); a tie goes to `Insert`. The
//! collected operations are reversed into sequence order.
//!
//! # Invariants
//!
//! 1. Replaying the script over `a` (see [`apply_edits`]) yields `b` under `eq`.
//! 2. `Merge` and `Delete` operations visit `a` in order; `Merge` and
//!    `Insert` operations visit `b` in order.
//! 3. `eq` is evaluated exactly once per interior cell.
//!
//! # Complexity
//!
//! O(|a|·|b|) time and space. Inputs are sibling lists, not whole documents.
//!
//! # Failure Modes
//!
//! An `eq` that is not consistent (e.g. returns different answers for the same
//! pair) is not detected. The script stays well-formed in shape, but replaying
//! it may not reproduce `b`.

use std::fmt;

/// One step of an edit script.
#[derive(Debug, PartialEq, Eq)]
pub enum Edit<'a, A, B = A> {
    /// Keep `a`'s element, pairing it with `b`'s matching element.
    Merge(&'a A, &'a B),
    /// Drop an element of `a`.
    Delete(&'a A),
    /// Add an element of `b`.
    Insert(&'a B),
}

impl<A, B> Clone for Edit<'_, A, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, B> Copy for Edit<'_, A, B> {}

impl<A, B> Edit<'_, A, B> {
    /// Short operation name, used in logs and test failure messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Merge(..) => "merge",
            Self::Delete(_) => "delete",
            Self::Insert(_) => "insert",
        }
    }
}

/// Operation counts for an edit script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditStats {
    pub merges: usize,
    pub deletes: usize,
    pub inserts: usize,
}

impl EditStats {
    /// Tally the operations of `edits`.
    #[must_use]
    pub fn of<A, B>(edits: &[Edit<'_, A, B>]) -> Self {
        edits.iter().fold(Self::default(), |mut stats, edit| {
            match edit {
                Edit::Merge(..) => stats.merges += 1,
                Edit::Delete(_) => stats.deletes += 1,
                Edit::Insert(_) => stats.inserts += 1,
            }
            stats
        })
    }

    /// Edit cost: every non-merge operation costs one.
    #[must_use]
    pub const fn cost(&self) -> usize {
        self.deletes + self.inserts
    }

    /// Whether the script only merges (the sequences matched pairwise).
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.deletes == 0 && self.inserts == 0
    }
}

impl fmt::Display for EditStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "merge={} delete={} insert={}",
            self.merges, self.deletes, self.inserts
        )
    }
}

/// Dense cost table plus cached `eq` outcomes.
struct CostTable {
    cols: usize,
    cost: Vec<u32>,
    matched: Vec<bool>,
}

impl CostTable {
    fn build<A, B>(a: &[A], b: &[B], eq: &mut impl FnMut(&A, &B) -> bool) -> Self {
        let rows = a.len() + 1;
        let cols = b.len() + 1;
        let mut cost = vec![0u32; rows * cols];
        let mut matched = vec![false; a.len() * b.len()];

        for (j, cell) in cost.iter_mut().take(cols).enumerate() {
            *cell = j as u32;
        }
        for i in 1..rows {
            cost[i * cols] = i as u32;
            for j in 1..cols {
                let is_match = eq(&a[i - 1], &b[j - 1]);
                matched[(i - 1) * b.len() + (j - 1)] = is_match;
                cost[i * cols + j] = if is_match {
                    cost[(i - 1) * cols + (j - 1)]
                } else {
                    1 + cost[(i - 1) * cols + j].min(cost[i * cols + (j - 1)])
                };
            }
        }

        Self {
            cols,
            cost,
            matched,
        }
    }

    #[inline]
    fn at(&self, i: usize, j: usize) -> u32 {
        self.cost[i * self.cols + j]
    }

    #[inline]
    fn matched(&self, i: usize, j: usize) -> bool {
        self.matched[(i - 1) * (self.cols - 1) + (j - 1)]
    }
}

/// Compute the edit script turning `a` into `b`.
///
/// `eq` is the only matching criterion. See the module docs for the cost
/// model and tie-break rules.
pub fn diff_array<'a, A, B>(
    a: &'a [A],
    b: &'a [B],
    mut eq: impl FnMut(&A, &B) -> bool,
) -> Vec<Edit<'a, A, B>> {
    #[cfg(feature = "tracing")]
    let _span = tracing::trace_span!("diff_array", old_len = a.len(), new_len = b.len()).entered();

    if a.is_empty() {
        return b.iter().map(Edit::Insert).collect();
    }
    if b.is_empty() {
        return a.iter().map(Edit::Delete).collect();
    }

    let table = CostTable::build(a, b, &mut eq);
    let mut edits = Vec::with_capacity(a.len().max(b.len()));
    let (mut i, mut j) = (a.len(), b.len());

    while i > 0 || j > 0 {
        if i == 0 {
            edits.push(Edit::Insert(&b[j - 1]));
            j -= 1;
        } else if j == 0 {
            edits.push(Edit::Delete(&a[i - 1]));
            i -= 1;
        } else if table.matched(i, j) {
            edits.push(Edit::Merge(&a[i - 1], &b[j - 1]));
            i -= 1;
            j -= 1;
        } else if table.at(i, j - 1) <= table.at(i - 1, j) {
            edits.push(Edit::Insert(&b[j - 1]));
            j -= 1;
        } else {
            edits.push(Edit::Delete(&a[i - 1]));
            i -= 1;
        }
    }

    edits.reverse();
    edits
}

/// Replay `edits` over a copy of `a`.
///
/// `Merge` advances the cursor, `Delete` removes at the cursor, `Insert`
/// inserts at the cursor and advances. Merged positions keep `a`'s element.
#[must_use]
pub fn apply_edits<T: Clone>(a: &[T], edits: &[Edit<'_, T>]) -> Vec<T> {
    let mut out = a.to_vec();
    let mut cursor = 0;
    for edit in edits {
        match edit {
            Edit::Merge(..) => cursor += 1,
            Edit::Delete(_) => {
                if cursor < out.len() {
                    out.remove(cursor);
                }
            }
            Edit::Insert(value) => {
                out.insert(cursor.min(out.len()), (*value).clone());
                cursor += 1;
            }
        }
    }
    out
}
