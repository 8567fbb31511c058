//! Observable value model.
//!
//! [`Value`] is a dynamically typed value whose objects and arrays are
//! shared, interior-mutable handles compared by reference. Every mutation
//! made through [`ObjectRef`] or [`ArrayRef`] is reported as a
//! [`ChangeRecord`] to the native watches installed on the container.
//!
//! Two equalities are provided:
//! - `==` is strict identity: numbers by IEEE equality, strings by content,
//!   containers by reference.
//! - [`same_value`] differs only for numbers: `NaN` equals `NaN` and `+0`
//!   does not equal `-0`. Change detection uses it throughout.

use crate::path::{canonical_index, Key};
use crate::record::{Change, ChangeRecord};
use crate::watch::Watchers;
use indexmap::IndexMap;
use observe_array_splice::Splice;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Upper bound on array length, as for JavaScript arrays. Index writes and
/// `length` assignments that would exceed it are refused.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjectRef),
    Array(ArrayRef),
}

/// Sameness: identity, except that `NaN` is the same as `NaN` and `+0` is
/// not the same as `-0`.
///
/// ```
/// use observe::value::{same_value, Value};
///
/// assert!(same_value(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
/// assert!(!same_value(&Value::Number(0.0), &Value::Number(-0.0)));
/// ```
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x.is_nan() && y.is_nan() {
                true
            } else if *x == 0.0 && *y == 0.0 {
                x.is_sign_negative() == y.is_sign_negative()
            } else {
                x == y
            }
        }
        _ => a == b,
    }
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Objects and arrays.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) | Value::Array(_) => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Reference identity of a container.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Object(object) => Some(object.identity()),
            Value::Array(array) => Some(array.identity()),
            _ => None,
        }
    }

    pub(crate) fn watchers(&self) -> Option<&Watchers> {
        match self {
            Value::Object(object) => Some(&object.0.watchers),
            Value::Array(array) => Some(&array.0.watchers),
            _ => None,
        }
    }

    /// Property read. Arrays answer `length` and index keys, strings answer
    /// `length` and single characters, objects answer their own properties.
    ///
    /// String `length` and indices both count `char`s, so `s[length - 1]`
    /// is always the last character.
    pub fn get_key(&self, key: &Key) -> Value {
        match (self, key) {
            (Value::Object(object), key) => object.get_key(key),
            (Value::Array(array), Key::Index(index)) => array.get(*index),
            (Value::Array(array), Key::Name(name)) if name == "length" => {
                Value::Number(array.len() as f64)
            }
            (Value::String(s), Key::Name(name)) if name == "length" => {
                Value::Number(s.chars().count() as f64)
            }
            (Value::String(s), Key::Index(index)) => s
                .chars()
                .nth(*index)
                .map(|c| Value::from(c.to_string()))
                .unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Property write. Returns `false` when the target cannot hold the key.
    pub fn set_key(&self, key: &Key, value: Value) -> bool {
        match (self, key) {
            (Value::Object(object), key) => {
                object.set(key.to_string(), value);
                true
            }
            (Value::Array(array), Key::Index(index)) => array.set(*index, value),
            (Value::Array(array), Key::Name(name)) if name == "length" => match value {
                Value::Number(n)
                    if n >= 0.0 && n.fract() == 0.0 && n <= MAX_ARRAY_LENGTH as f64 =>
                {
                    array.set_len(n as usize)
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Builds a fresh object graph from JSON.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s.as_str()),
            serde_json::Value::Array(items) => {
                Value::Array(ArrayRef::from_vec(items.iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => Value::Object(ObjectRef::from_entries(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))),
            )),
        }
    }

    /// Renders as JSON. `Undefined`, non-finite numbers and cyclic
    /// references become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut stack = Vec::new();
        to_json_inner(self, &mut stack)
    }

    /// Structural equality. Numbers compare with [`same_value`].
    pub fn deep_equals(&self, other: &Value) -> bool {
        let mut in_progress = HashSet::new();
        deep_equals_inner(self, other, &mut in_progress)
    }
}

fn to_json_inner(value: &Value, stack: &mut Vec<usize>) -> serde_json::Value {
    use serde_json::Value as Json;

    let id = value.identity();
    if let Some(id) = id {
        if stack.contains(&id) {
            return Json::Null;
        }
        stack.push(id);
    }
    let json = match value {
        Value::Undefined | Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Json::from(*n as i64),
        Value::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s.to_string()),
        Value::Array(array) => Json::Array(
            array
                .to_vec()
                .iter()
                .map(|item| to_json_inner(item, stack))
                .collect(),
        ),
        Value::Object(object) => Json::Object(
            object
                .entries()
                .into_iter()
                .map(|(k, v)| (k, to_json_inner(&v, stack)))
                .collect(),
        ),
    };
    if id.is_some() {
        stack.pop();
    }
    json
}

fn deep_equals_inner(a: &Value, b: &Value, in_progress: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            if x.ptr_eq(y) || !in_progress.insert((x.identity(), y.identity())) {
                return true;
            }
            let (left, right) = (x.entries(), y.entries());
            left.len() == right.len()
                && left.iter().all(|(key, value)| {
                    y.has(key) && deep_equals_inner(value, &y.get(key), in_progress)
                })
        }
        (Value::Array(x), Value::Array(y)) => {
            if x.ptr_eq(y) || !in_progress.insert((x.identity(), y.identity())) {
                return true;
            }
            let (left, right) = (x.to_vec(), y.to_vec());
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right.iter())
                    .all(|(l, r)| deep_equals_inner(l, r, in_progress))
        }
        _ => same_value(a, b),
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

impl From<ArrayRef> for Value {
    fn from(value: ArrayRef) -> Self {
        Value::Array(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::from_vec(items))
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

// ── Objects ─────────────────────────────────────────────────────────────

struct ObjectCell {
    props: RefCell<IndexMap<String, Value>>,
    watchers: Watchers,
}

/// Shared handle to an insertion-ordered property map.
#[derive(Clone)]
pub struct ObjectRef(Rc<ObjectCell>);

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRef {
    pub fn new() -> Self {
        Self(Rc::new(ObjectCell {
            props: RefCell::new(IndexMap::new()),
            watchers: Watchers::default(),
        }))
    }

    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let object = Self::new();
        object
            .0
            .props
            .borrow_mut()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v)));
        object
    }

    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn get(&self, name: &str) -> Value {
        self.0.props.borrow().get(name).cloned().unwrap_or_default()
    }

    fn get_key(&self, key: &Key) -> Value {
        match key {
            Key::Name(name) => self.get(name),
            Key::Index(index) => self.get(&index.to_string()),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.props.borrow().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.props.borrow().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.props.borrow().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .props
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Copy of the current properties.
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.0.props.borrow().clone()
    }

    /// Assigns a property. Emits `Add` for a new name and `Update` when the
    /// previous value is not the same value.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let previous = self.0.props.borrow_mut().insert(name.clone(), value.clone());
        let change = match previous {
            None => Change::Add { name },
            Some(old_value) if !same_value(&old_value, &value) => Change::Update { name, old_value },
            Some(_) => return,
        };
        self.notify(change);
    }

    /// Removes a property, keeping the order of the others.
    pub fn delete(&self, name: &str) -> Option<Value> {
        let old_value = self.0.props.borrow_mut().shift_remove(name)?;
        self.notify(Change::Delete {
            name: name.to_owned(),
            old_value: old_value.clone(),
        });
        Some(old_value)
    }

    /// Number of live native watches installed on this object.
    pub fn watch_count(&self) -> usize {
        self.0.watchers.len()
    }

    fn notify(&self, change: Change) {
        self.0
            .watchers
            .notify(|| ChangeRecord::new(Value::Object(self.clone()), change));
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("id", &format_args!("{:#x}", self.identity()))
            .field("keys", &self.keys())
            .finish()
    }
}

// ── Arrays ──────────────────────────────────────────────────────────────

struct ArrayCell {
    items: RefCell<Vec<Value>>,
    watchers: Watchers,
}

/// Shared handle to a growable array.
#[derive(Clone)]
pub struct ArrayRef(Rc<ArrayCell>);

impl Default for ArrayRef {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayRef {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(ArrayCell {
            items: RefCell::new(items),
            watchers: Watchers::default(),
        }))
    }

    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn get(&self, index: usize) -> Value {
        self.0.items.borrow().get(index).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Element assignment. Inside bounds this emits `Update` (when the value
    /// changes); past the end the array grows, holes filled with
    /// `Undefined`, and a splice is emitted.
    ///
    /// Returns `false`, leaving the array untouched, when `index` is not
    /// below [`MAX_ARRAY_LENGTH`] or the growth cannot be allocated.
    pub fn set(&self, index: usize, value: Value) -> bool {
        if index >= MAX_ARRAY_LENGTH {
            return false;
        }
        let change = {
            let mut items = self.0.items.borrow_mut();
            if let Some(slot) = items.get_mut(index) {
                let old_value = std::mem::replace(slot, value.clone());
                if same_value(&old_value, &value) {
                    return true;
                }
                Change::Update {
                    name: index.to_string(),
                    old_value,
                }
            } else {
                let old_len = items.len();
                let added_count = index + 1 - old_len;
                if items.try_reserve(added_count).is_err() {
                    return false;
                }
                items.resize(index, Value::Undefined);
                items.push(value);
                Change::Splice(Splice::new(old_len, Vec::new(), added_count))
            }
        };
        self.notify(change);
        true
    }

    pub fn push(&self, value: Value) {
        let index = {
            let mut items = self.0.items.borrow_mut();
            items.push(value);
            items.len() - 1
        };
        self.notify(Change::Splice(Splice::new(index, Vec::new(), 1)));
    }

    pub fn pop(&self) -> Option<Value> {
        let (index, value) = {
            let mut items = self.0.items.borrow_mut();
            let value = items.pop()?;
            (items.len(), value)
        };
        self.notify(Change::Splice(Splice::new(index, vec![value.clone()], 0)));
        Some(value)
    }

    /// Inserts at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, value: Value) {
        let index = {
            let mut items = self.0.items.borrow_mut();
            let index = index.min(items.len());
            items.insert(index, value);
            index
        };
        self.notify(Change::Splice(Splice::new(index, Vec::new(), 1)));
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        let value = {
            let mut items = self.0.items.borrow_mut();
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        self.notify(Change::Splice(Splice::new(index, vec![value.clone()], 0)));
        Some(value)
    }

    /// Removes up to `delete_count` elements at `start` and inserts `items`
    /// in their place. `start` is clamped to the length. Returns the removed
    /// elements.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        let (start, removed, added_count) = {
            let mut current = self.0.items.borrow_mut();
            let start = start.min(current.len());
            let end = start + delete_count.min(current.len() - start);
            let before = current.len();
            let removed: Vec<Value> = current.splice(start..end, items).collect();
            let added_count = current.len() + removed.len() - before;
            (start, removed, added_count)
        };
        if !removed.is_empty() || added_count > 0 {
            self.notify(Change::Splice(Splice::new(start, removed.clone(), added_count)));
        }
        removed
    }

    pub fn truncate(&self, len: usize) {
        let removed = {
            let mut items = self.0.items.borrow_mut();
            if len >= items.len() {
                return;
            }
            items.split_off(len)
        };
        self.notify(Change::Splice(Splice::new(len, removed, 0)));
    }

    pub fn clear(&self) {
        self.truncate(0);
    }

    /// Truncates or pads with `Undefined` to exactly `len` elements.
    ///
    /// Returns `false`, leaving the array untouched, when `len` exceeds
    /// [`MAX_ARRAY_LENGTH`] or the padding cannot be allocated.
    pub fn set_len(&self, len: usize) -> bool {
        if len > MAX_ARRAY_LENGTH {
            return false;
        }
        let current = self.len();
        if len < current {
            self.truncate(len);
        } else if len > current {
            if self.0.items.borrow_mut().try_reserve(len - current).is_err() {
                return false;
            }
            self.splice(current, 0, std::iter::repeat(Value::Undefined).take(len - current));
        }
        true
    }

    /// Number of live native watches installed on this array.
    pub fn watch_count(&self) -> usize {
        self.0.watchers.len()
    }

    fn notify(&self, change: Change) {
        self.0
            .watchers
            .notify(|| ChangeRecord::new(Value::Array(self.clone()), change));
    }
}

impl PartialEq for ArrayRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRef")
            .field("id", &format_args!("{:#x}", self.identity()))
            .field("len", &self.len())
            .finish()
    }
}

/// Index named by a record's property name, if it is one.
pub(crate) fn record_index(name: &str) -> Option<usize> {
    canonical_index(name)
}
