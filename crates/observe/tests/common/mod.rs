#![allow(dead_code)]

use observe::{Runtime, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared call log captured by observer callbacks.
pub type Log<T> = Rc<RefCell<Vec<T>>>;

pub fn log<T>() -> Log<T> {
    Rc::new(RefCell::new(Vec::new()))
}

/// One runtime per change source, labelled for assertion messages.
pub fn runtimes() -> [(&'static str, Runtime); 2] {
    [
        ("dirty-checking", Runtime::dirty_checking()),
        ("native-notification", Runtime::native()),
    ]
}

pub fn json(value: serde_json::Value) -> Value {
    Value::from_json(&value)
}

pub fn ints(items: &[i32]) -> Vec<Value> {
    items.iter().copied().map(Value::from).collect()
}
