//! Incremental splice merging.
//!
//! Splices observed one at a time (each in the coordinates of the array as
//! it was right after the previous one) are folded into a single ordered,
//! non-overlapping list expressed against the original snapshot.

use crate::calc::calc_splices_by;
use crate::Splice;

/// Length of the overlap of `[start1, end1)` and `[start2, end2)`.
///
/// `None` when the ranges are disjoint, `Some(0)` when they only touch.
fn intersect(start1: usize, end1: usize, start2: usize, end2: usize) -> Option<usize> {
    if end1 < start2 || end2 < start1 {
        return None;
    }
    if end1 == start2 || end2 == start1 {
        return Some(0);
    }
    if start1 < start2 {
        if end1 < end2 {
            Some(end1 - start2)
        } else {
            Some(end2 - start2)
        }
    } else if end2 < end1 {
        Some(end2 - start1)
    } else {
        Some(end1 - start1)
    }
}

/// Folds the splice `(index, removed, added_count)` into `splices`.
///
/// Prior splices whose added range touches or overlaps the removed range of
/// the new splice are merged into it; `removed` is re-sliced when the new
/// splice only partially covers a prior one. Splices after the insertion
/// point are shifted by the net length change. A merge that cancels out
/// completely leaves no splice behind.
pub fn merge_splice<T: Clone>(
    splices: &mut Vec<Splice<T>>,
    index: usize,
    removed: Vec<T>,
    added_count: usize,
) {
    let mut pending = Some(Splice::new(index, removed, added_count));
    let mut insertion_offset: isize = 0;
    let mut i = 0;

    while i < splices.len() {
        splices[i].index = splices[i].index.saturating_add_signed(insertion_offset);

        let Some(splice) = pending.as_mut() else {
            i += 1;
            continue;
        };

        let current_index = splices[i].index;
        let current_added = splices[i].added_count;
        let overlap = intersect(
            splice.index,
            splice.index + splice.removed.len(),
            current_index,
            current_index + current_added,
        );

        match overlap {
            Some(intersect_count) => {
                let current = splices.remove(i);
                insertion_offset -= current.delta();

                splice.added_count += current.added_count - intersect_count;
                let delete_count = splice.removed.len() + current.removed.len() - intersect_count;

                if splice.added_count == 0 && delete_count == 0 {
                    pending = None;
                    continue;
                }

                let mut merged = current.removed;
                if splice.index < current.index {
                    let mut prepend = splice.removed[..current.index - splice.index].to_vec();
                    prepend.append(&mut merged);
                    merged = prepend;
                }
                let current_end = current.index + current.added_count;
                if splice.index + splice.removed.len() > current_end {
                    merged.extend_from_slice(&splice.removed[current_end - splice.index..]);
                }
                splice.removed = merged;
                if current.index < splice.index {
                    splice.index = current.index;
                }
            }
            None if splice.index < current_index => {
                let offset = splice.delta();
                if let Some(splice) = pending.take() {
                    splices.insert(i, splice);
                }
                i += 1;
                splices[i].index = splices[i].index.saturating_add_signed(offset);
                insertion_offset += offset;
                i += 1;
            }
            None => i += 1,
        }
    }

    if let Some(splice) = pending {
        splices.push(splice);
    }
}

/// Refines merged splices against the live array `current`.
///
/// A one-for-one replacement is kept only when the element actually
/// differs; every other splice is re-diffed over its own range so that
/// splices under-describing the change come out minimal.
pub fn project_splices<T: Clone + PartialEq>(current: &[T], merged: Vec<Splice<T>>) -> Vec<Splice<T>> {
    project_splices_by(current, merged, |a: &T, b: &T| a == b)
}

/// Like [`project_splices`] with an explicit identity comparator.
pub fn project_splices_by<T, F>(current: &[T], merged: Vec<Splice<T>>, eq: F) -> Vec<Splice<T>>
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    let mut splices = Vec::with_capacity(merged.len());

    for splice in merged {
        if splice.added_count == 1 && splice.removed.len() == 1 {
            let unchanged = current
                .get(splice.index)
                .is_some_and(|value| eq(&splice.removed[0], value));
            if !unchanged {
                splices.push(splice);
            }
            continue;
        }

        let end = (splice.index + splice.added_count).min(current.len());
        let start = splice.index.min(end);
        splices.extend(calc_splices_by(
            current,
            start,
            end,
            &splice.removed,
            0,
            splice.removed.len(),
            &eq,
        ));
    }

    splices
}
