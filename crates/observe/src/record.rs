//! Change records emitted by object and array mutations.

use crate::value::Value;
use observe_array_splice::Splice;

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Add { name: String },
    Update { name: String, old_value: Value },
    Delete { name: String, old_value: Value },
    Splice(Splice<Value>),
}

/// One mutation of `object`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub object: Value,
    pub change: Change,
}

impl ChangeRecord {
    pub fn new(object: Value, change: Change) -> Self {
        Self { object, change }
    }

    /// Property name touched by the record; splices have none.
    pub fn name(&self) -> Option<&str> {
        match &self.change {
            Change::Add { name } | Change::Update { name, .. } | Change::Delete { name, .. } => {
                Some(name)
            }
            Change::Splice(_) => None,
        }
    }

    /// Previous value of the touched property. `Add` records report
    /// `Undefined`, splices `None`.
    pub fn old_value(&self) -> Option<Value> {
        match &self.change {
            Change::Add { .. } => Some(Value::Undefined),
            Change::Update { old_value, .. } | Change::Delete { old_value, .. } => {
                Some(old_value.clone())
            }
            Change::Splice(_) => None,
        }
    }
}
