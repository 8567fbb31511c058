//! Splices over observed arrays.
//!
//! Element identity is strict equality (`==` on [`Value`]), so `0` and `-0`
//! are the same element. `NaN` is the one exception: it matches itself, so
//! arrays holding `NaN` diff to nothing against themselves.

use crate::record::{Change, ChangeRecord};
use crate::value::{record_index, Value};
use observe_array_splice::{calculate_splices_by, merge_splice, project_splices_by};

pub use observe_array_splice::Splice;

/// Whether two array elements are the same element for splice purposes.
pub fn same_element(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a == b,
    }
}

/// Splices turning `previous` into `current`.
pub fn calculate_splices(current: &[Value], previous: &[Value]) -> Vec<Splice<Value>> {
    calculate_splices_by(current, previous, same_element)
}

/// Reduces native change records of one array to the splices describing
/// how its previous contents became `array`.
///
/// Splice records are merged as they come; element updates count as a
/// one-for-one replacement at their index. Records naming non-index
/// properties are ignored.
pub fn project_array_splices(array: &[Value], records: &[ChangeRecord]) -> Vec<Splice<Value>> {
    let mut merged = Vec::new();
    for record in records {
        match &record.change {
            Change::Splice(splice) => merge_splice(
                &mut merged,
                splice.index,
                splice.removed.clone(),
                splice.added_count,
            ),
            Change::Add { name } | Change::Update { name, .. } | Change::Delete { name, .. } => {
                let Some(index) = record_index(name) else {
                    continue;
                };
                let old_value = record.old_value().unwrap_or_default();
                merge_splice(&mut merged, index, vec![old_value], 1);
            }
        }
    }
    project_splices_by(array, merged, same_element)
}
