//! Property paths.
//!
//! A [`Path`] is an immutable, shared sequence of [`Key`]s. Paths built
//! from strings go through [`PathCache`] so that equal strings resolve to
//! the same instance; malformed strings resolve to the invalid path, whose
//! accessors are no-ops.
//!
//! # Example
//!
//! ```
//! use observe::path::Path;
//! use observe::value::Value;
//!
//! let root = Value::from_json(&serde_json::json!({"a": {"b": [10, 20]}}));
//! let path = Path::parse("a.b[1]");
//! assert_eq!(path.get_value_from(&root), Value::from(20));
//! assert!(path.set_value_from(&root, Value::from(21)));
//! assert_eq!(path.to_string(), "a.b[1]");
//!
//! let bad = Path::parse("a..b");
//! assert!(!bad.is_valid());
//! assert_eq!(bad.get_value_from(&root), Value::Undefined);
//! ```

mod cache;
mod parser;

pub use cache::PathCache;
pub use parser::{classify, parse_path, CharClass, ParseState, PathParseError};

use crate::value::Value;
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// One step of property access.
///
/// Names that are canonical array indices (`"0"`, `"42"`, not `"07"`) are
/// always stored as [`Key::Index`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl Key {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            Key::Name(_) => None,
        }
    }
}

/// Returns the index a canonical index string denotes.
pub fn canonical_index(name: &str) -> Option<usize> {
    let bytes = name.as_bytes();
    match bytes {
        [b'0'] => Some(0),
        [b'1'..=b'9', rest @ ..] if rest.iter().all(u8::is_ascii_digit) => name.parse().ok(),
        _ => None,
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        match canonical_index(&name) {
            Some(index) => Key::Index(index),
            None => Key::Name(name),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        match canonical_index(name) {
            Some(index) => Key::Index(index),
            None => Key::Name(name.to_owned()),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
        }
    }
}

fn is_ident(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Formats keys in the canonical string form accepted by [`parse_path`].
pub fn format_keys(keys: &[Key]) -> String {
    let mut out = String::new();
    for (i, key) in keys.iter().enumerate() {
        match key {
            Key::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
            Key::Name(name) if is_ident(name) => {
                if i > 0 {
                    out.push('.');
                }
                out.push_str(name);
            }
            Key::Name(name) => {
                out.push_str("[\"");
                out.push_str(&name.replace('"', "\\\""));
                out.push_str("\"]");
            }
        }
    }
    out
}

type Getter = Box<dyn Fn(&Value) -> Value>;

struct PathInner {
    keys: Vec<Key>,
    valid: bool,
    getter: OnceCell<Getter>,
}

/// Shared, immutable key sequence. Cloning is cheap and preserves identity.
#[derive(Clone)]
pub struct Path(Rc<PathInner>);

impl Path {
    pub fn from_keys(keys: Vec<Key>) -> Self {
        Self(Rc::new(PathInner {
            keys,
            valid: true,
            getter: OnceCell::new(),
        }))
    }

    pub fn invalid() -> Self {
        Self(Rc::new(PathInner {
            keys: Vec::new(),
            valid: false,
            getter: OnceCell::new(),
        }))
    }

    /// Parses `text` without interning. Malformed input yields an invalid
    /// path.
    pub fn parse(text: &str) -> Self {
        match parse_path(text) {
            Ok(keys) => Self::from_keys(keys),
            Err(error) => {
                debug!(path = text, %error, "malformed path");
                Self::invalid()
            }
        }
    }

    pub fn keys(&self) -> &[Key] {
        &self.0.keys
    }

    pub fn len(&self) -> usize {
        self.0.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.keys.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.0.valid
    }

    pub fn ptr_eq(&self, other: &Path) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Reads the value at this path. Missing steps and nullish
    /// intermediates yield `Undefined`.
    pub fn get_value_from(&self, root: &Value) -> Value {
        if !self.0.valid {
            return Value::Undefined;
        }
        let getter = self.0.getter.get_or_init(|| compile(&self.0.keys));
        getter(root)
    }

    /// Assigns `value` at this path. Returns `false` (and changes nothing)
    /// when the path is empty or invalid, or when an intermediate value is
    /// not an object.
    pub fn set_value_from(&self, root: &Value, value: Value) -> bool {
        let Some((last, parents)) = self.0.keys.split_last() else {
            return false;
        };
        if !self.0.valid {
            return false;
        }
        let mut target = root.clone();
        for key in parents {
            if !target.is_object() {
                return false;
            }
            target = target.get_key(key);
        }
        target.is_object() && target.set_key(last, value)
    }

    /// Visits every object on the ownership chain, root first, together
    /// with the key read from it. Stops at the first non-object.
    pub fn iterate_objects(&self, root: &Value, visit: &mut dyn FnMut(&Value, &Key)) {
        let mut current = root.clone();
        for (i, key) in self.0.keys.iter().enumerate() {
            if i > 0 {
                current = current.get_key(&self.0.keys[i - 1]);
            }
            if !current.is_object() {
                return;
            }
            visit(&current, key);
        }
    }
}

fn step(value: &Value, key: &Key) -> Value {
    if value.is_nullish() {
        Value::Undefined
    } else {
        value.get_key(key)
    }
}

/// Builds an accessor specialised on the number of keys.
fn compile(keys: &[Key]) -> Getter {
    match keys {
        [] => Box::new(Value::clone),
        [a] => {
            let a = a.clone();
            Box::new(move |root| step(root, &a))
        }
        [a, b] => {
            let (a, b) = (a.clone(), b.clone());
            Box::new(move |root| step(&step(root, &a), &b))
        }
        [a, b, c] => {
            let (a, b, c) = (a.clone(), b.clone(), c.clone());
            Box::new(move |root| step(&step(&step(root, &a), &b), &c))
        }
        _ => {
            let keys = keys.to_vec();
            Box::new(move |root| {
                let mut current = root.clone();
                for key in &keys {
                    if current.is_nullish() {
                        return Value::Undefined;
                    }
                    current = current.get_key(key);
                }
                current
            })
        }
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.0.valid == other.0.valid && self.0.keys == other.0.keys
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_keys(&self.0.keys))
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.valid {
            write!(f, "Path({self})")
        } else {
            f.write_str("Path(<invalid>)")
        }
    }
}

/// Anything a [`Path`] can be obtained from through a [`PathCache`].
pub trait IntoPath {
    fn into_path(self, cache: &mut PathCache) -> Path;
}

impl IntoPath for &str {
    fn into_path(self, cache: &mut PathCache) -> Path {
        cache.get(self)
    }
}

impl IntoPath for String {
    fn into_path(self, cache: &mut PathCache) -> Path {
        cache.get(&self)
    }
}

impl IntoPath for &String {
    fn into_path(self, cache: &mut PathCache) -> Path {
        cache.get(self)
    }
}

impl IntoPath for Path {
    fn into_path(self, _cache: &mut PathCache) -> Path {
        self
    }
}

impl IntoPath for &Path {
    fn into_path(self, _cache: &mut PathCache) -> Path {
        self.clone()
    }
}

/// Pre-parsed keys are taken as-is and never interned.
impl IntoPath for Vec<Key> {
    fn into_path(self, _cache: &mut PathCache) -> Path {
        Path::from_keys(self)
    }
}

impl IntoPath for &[Key] {
    fn into_path(self, _cache: &mut PathCache) -> Path {
        Path::from_keys(self.to_vec())
    }
}
