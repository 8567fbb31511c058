//! Array splice diffing.
//!
//! Reduces two snapshots of an array to an ordered list of [`Splice`]
//! records, and folds incrementally reported splices into such a list.
//!
//! - [`calculate_splices`] / [`calc_splices`]: edit-distance based diff of
//!   two snapshots (or sub-ranges of them).
//! - [`merge_splice`]: folds one more observed splice into an accumulated,
//!   ordered, non-overlapping list.
//! - [`project_splices`]: refines a merged list against the live array so
//!   that every splice describes real content change.
//! - [`apply_splices`]: replays a splice list onto the old snapshot.
//!
//! # Example
//!
//! ```
//! use observe_array_splice::{apply_splices, calculate_splices, Splice};
//!
//! let old = vec![1, 2, 3, 4];
//! let new = vec![1, 5, 6, 4];
//! let splices = calculate_splices(&new, &old);
//! assert_eq!(splices, vec![Splice::new(1, vec![2, 3], 2)]);
//!
//! let mut replay = old.clone();
//! apply_splices(&mut replay, &new, &splices);
//! assert_eq!(replay, new);
//! ```
//!
//! Element identity is `PartialEq` for the plain functions; every function
//! has a `*_by` twin taking an explicit comparator.

mod calc;
mod merge;

pub use calc::{
    calc_splices, calc_splices_by, calculate_splices, calculate_splices_by, edit_distances,
    edit_ops, EditOp,
};
pub use merge::{merge_splice, project_splices, project_splices_by};

/// One range replacement: starting at `index` (in the coordinates of the
/// new array), `removed` elements of the old array were replaced by
/// `added_count` elements of the new array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice<T> {
    pub index: usize,
    pub removed: Vec<T>,
    pub added_count: usize,
}

impl<T> Splice<T> {
    pub fn new(index: usize, removed: Vec<T>, added_count: usize) -> Self {
        Self {
            index,
            removed,
            added_count,
        }
    }

    /// Net change in array length introduced by this splice.
    pub fn delta(&self) -> isize {
        self.added_count as isize - self.removed.len() as isize
    }

    pub fn is_noop(&self) -> bool {
        self.added_count == 0 && self.removed.is_empty()
    }
}

/// Mutates `previous` in place so that it matches `current`, replaying
/// `splices` in order.
///
/// # Panics
///
/// Panics if a splice addresses a range outside `previous` or `current`,
/// i.e. when `splices` was not computed from these two arrays.
pub fn apply_splices<T: Clone>(previous: &mut Vec<T>, current: &[T], splices: &[Splice<T>]) {
    for splice in splices {
        let removed_end = splice.index + splice.removed.len();
        let added = &current[splice.index..splice.index + splice.added_count];
        previous.splice(splice.index..removed_end, added.iter().cloned());
    }
}
