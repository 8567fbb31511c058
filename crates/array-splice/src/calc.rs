//! Edit-distance splice calculation.
//!
//! The matrix only offers three moves: keep an identical element (cost 0),
//! delete an old element (cost 1), add a new element (cost 1). A changed
//! element is therefore a delete plus an add (cost 2).

use crate::Splice;

/// One step of the backtraced edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    Leave,
    Update,
    Add,
    Delete,
}

/// Builds the edit-distance matrix between `old[old_start..old_end]` (rows)
/// and `current[current_start..current_end]` (columns).
///
/// The result always has at least one row and one column.
pub fn edit_distances<T, F>(
    current: &[T],
    current_start: usize,
    current_end: usize,
    old: &[T],
    old_start: usize,
    old_end: usize,
    eq: F,
) -> Vec<Vec<usize>>
where
    F: Fn(&T, &T) -> bool,
{
    let row_count = old_end - old_start + 1;
    let column_count = current_end - current_start + 1;
    let mut distances = vec![vec![0usize; column_count]; row_count];

    for (i, row) in distances.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in distances[0].iter_mut().enumerate() {
        *cell = j;
    }

    for i in 1..row_count {
        for j in 1..column_count {
            distances[i][j] = if eq(&current[current_start + j - 1], &old[old_start + i - 1]) {
                distances[i - 1][j - 1]
            } else {
                let north = distances[i - 1][j] + 1;
                let west = distances[i][j - 1] + 1;
                north.min(west)
            };
        }
    }

    distances
}

/// Walks the matrix back from the bottom-right cell and returns the edit
/// script in forward order.
pub fn edit_ops(distances: &[Vec<usize>]) -> Vec<EditOp> {
    let Some(last_row) = distances.last() else {
        return Vec::new();
    };
    let mut i = distances.len() - 1;
    let mut j = last_row.len().saturating_sub(1);
    let mut current = distances[i][j];
    let mut edits = Vec::with_capacity(i + j);

    while i > 0 || j > 0 {
        if i == 0 {
            edits.push(EditOp::Add);
            j -= 1;
            continue;
        }
        if j == 0 {
            edits.push(EditOp::Delete);
            i -= 1;
            continue;
        }

        let north_west = distances[i - 1][j - 1];
        let up = distances[i - 1][j];
        let left = distances[i][j - 1];

        let min = if up < left {
            up.min(north_west)
        } else {
            left.min(north_west)
        };

        if min == north_west {
            if north_west == current {
                edits.push(EditOp::Leave);
            } else {
                edits.push(EditOp::Update);
                current = north_west;
            }
            i -= 1;
            j -= 1;
        } else if min == up {
            edits.push(EditOp::Delete);
            i -= 1;
            current = up;
        } else {
            edits.push(EditOp::Add);
            j -= 1;
            current = left;
        }
    }

    edits.reverse();
    edits
}

fn shared_prefix<T, F>(current: &[T], old: &[T], search_length: usize, eq: &F) -> usize
where
    F: Fn(&T, &T) -> bool,
{
    (0..search_length)
        .find(|&i| !eq(&current[i], &old[i]))
        .unwrap_or(search_length)
}

fn shared_suffix<T, F>(current: &[T], old: &[T], search_length: usize, eq: &F) -> usize
where
    F: Fn(&T, &T) -> bool,
{
    let mut count = 0;
    while count < search_length
        && eq(
            &current[current.len() - 1 - count],
            &old[old.len() - 1 - count],
        )
    {
        count += 1;
    }
    count
}

/// Splices turning `old[old_start..old_end]` into
/// `current[current_start..current_end]`, using `PartialEq` as identity.
pub fn calc_splices<T: Clone + PartialEq>(
    current: &[T],
    current_start: usize,
    current_end: usize,
    old: &[T],
    old_start: usize,
    old_end: usize,
) -> Vec<Splice<T>> {
    calc_splices_by(
        current,
        current_start,
        current_end,
        old,
        old_start,
        old_end,
        |a: &T, b: &T| a == b,
    )
}

/// Like [`calc_splices`] with an explicit identity comparator.
///
/// A shared prefix is only stripped when both ranges start at zero, and a
/// shared suffix only when both ranges reach the end of their arrays.
///
/// # Panics
///
/// Panics if a range is inverted or exceeds its array.
pub fn calc_splices_by<T, F>(
    current: &[T],
    mut current_start: usize,
    mut current_end: usize,
    old: &[T],
    mut old_start: usize,
    mut old_end: usize,
    eq: F,
) -> Vec<Splice<T>>
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    let min_length = (current_end - current_start).min(old_end - old_start);
    let prefix_count = if current_start == 0 && old_start == 0 {
        shared_prefix(current, old, min_length, &eq)
    } else {
        0
    };
    let suffix_count = if current_end == current.len() && old_end == old.len() {
        shared_suffix(current, old, min_length - prefix_count, &eq)
    } else {
        0
    };

    current_start += prefix_count;
    old_start += prefix_count;
    current_end -= suffix_count;
    old_end -= suffix_count;

    if current_end == current_start && old_end == old_start {
        return Vec::new();
    }
    if current_start == current_end {
        return vec![Splice::new(
            current_start,
            old[old_start..old_end].to_vec(),
            0,
        )];
    }
    if old_start == old_end {
        return vec![Splice::new(current_start, Vec::new(), current_end - current_start)];
    }

    let ops = edit_ops(&edit_distances(
        current,
        current_start,
        current_end,
        old,
        old_start,
        old_end,
        &eq,
    ));

    let mut splices = Vec::new();
    let mut open: Option<Splice<T>> = None;
    let mut index = current_start;
    let mut old_index = old_start;

    for op in ops {
        match op {
            EditOp::Leave => {
                if let Some(splice) = open.take() {
                    splices.push(splice);
                }
                index += 1;
                old_index += 1;
            }
            EditOp::Update => {
                let splice = open.get_or_insert_with(|| Splice::new(index, Vec::new(), 0));
                splice.added_count += 1;
                splice.removed.push(old[old_index].clone());
                index += 1;
                old_index += 1;
            }
            EditOp::Add => {
                let splice = open.get_or_insert_with(|| Splice::new(index, Vec::new(), 0));
                splice.added_count += 1;
                index += 1;
            }
            EditOp::Delete => {
                let splice = open.get_or_insert_with(|| Splice::new(index, Vec::new(), 0));
                splice.removed.push(old[old_index].clone());
                old_index += 1;
            }
        }
    }

    if let Some(splice) = open {
        splices.push(splice);
    }
    splices
}

/// Splices turning all of `previous` into all of `current`.
pub fn calculate_splices<T: Clone + PartialEq>(current: &[T], previous: &[T]) -> Vec<Splice<T>> {
    calc_splices(current, 0, current.len(), previous, 0, previous.len())
}

/// Like [`calculate_splices`] with an explicit identity comparator.
pub fn calculate_splices_by<T, F>(current: &[T], previous: &[T], eq: F) -> Vec<Splice<T>>
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    calc_splices_by(current, 0, current.len(), previous, 0, previous.len(), eq)
}
