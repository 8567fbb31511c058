use super::base::{Callback, ObserverBase};
use super::{Observer, ObserverState};
use crate::error::ObserveError;
use crate::observed_set::ObservedObject;
use crate::path::Key;
use crate::record::{Change, ChangeRecord};
use crate::runtime::Runtime;
use crate::value::{same_value, ObjectRef, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// How an object or array observer keeps track of its target.
pub(crate) enum Tracking<S> {
    Idle,
    /// Dirty checking: a copy taken at the last report.
    Shadow(S),
    /// Native notification: records arrive through a pooled watch.
    Native(Rc<ObservedObject>),
}

impl<S> Tracking<S> {
    pub(crate) fn observed(&self) -> Option<Rc<ObservedObject>> {
        match self {
            Tracking::Native(observed) => Some(observed.clone()),
            Tracking::Idle | Tracking::Shadow(_) => None,
        }
    }
}

/// Property-level difference between two states of one object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectChanges {
    /// New properties with their current values.
    pub added: IndexMap<String, Value>,
    pub removed: Vec<String>,
    /// Properties whose value changed, with their current values.
    pub changed: IndexMap<String, Value>,
    old_values: IndexMap<String, Value>,
}

impl ObjectChanges {
    /// Value `name` had before the change; `Undefined` when unknown.
    pub fn old_value(&self, name: &str) -> Value {
        self.old_values.get(name).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Diff of `object` against a shadow copy.
    pub(crate) fn from_shadow(object: &ObjectRef, shadow: &IndexMap<String, Value>) -> Self {
        let mut changes = ObjectChanges::default();
        for (name, old) in shadow {
            if !object.has(name) {
                changes.removed.push(name.clone());
                continue;
            }
            let new = object.get(name);
            if !same_value(&new, old) {
                changes.changed.insert(name.clone(), new);
            }
        }
        for (name, value) in object.entries() {
            if !shadow.contains_key(&name) {
                changes.added.insert(name, value);
            }
        }
        changes.old_values = shadow.clone();
        changes
    }

    /// Diff accumulated from native records. A property added and deleted
    /// again within one batch does not show up at all.
    pub(crate) fn from_records(object: &ObjectRef, records: &[ChangeRecord]) -> Self {
        let mut old_values: IndexMap<String, Value> = IndexMap::new();
        let mut added: Vec<String> = Vec::new();
        let mut removed: Vec<String> = Vec::new();

        for record in records {
            let (Some(name), Some(old)) = (record.name(), record.old_value()) else {
                continue;
            };
            if !old_values.contains_key(name) {
                old_values.insert(name.to_owned(), old);
            }
            match &record.change {
                Change::Add { .. } => {
                    if let Some(at) = removed.iter().position(|n| n == name) {
                        removed.remove(at);
                    } else {
                        added.push(name.to_owned());
                    }
                }
                Change::Delete { .. } => {
                    if let Some(at) = added.iter().position(|n| n == name) {
                        added.remove(at);
                        old_values.shift_remove(name);
                    } else {
                        removed.push(name.to_owned());
                    }
                }
                Change::Update { .. } | Change::Splice(_) => {}
            }
        }

        let mut changes = ObjectChanges {
            added: added
                .into_iter()
                .map(|name| {
                    let value = object.get(&name);
                    (name, value)
                })
                .collect(),
            removed,
            ..ObjectChanges::default()
        };
        for (name, old) in &old_values {
            if changes.added.contains_key(name) || changes.removed.contains(name) {
                continue;
            }
            let new = object.get(name);
            if !same_value(&new, old) {
                changes.changed.insert(name.clone(), new);
            }
        }
        changes.old_values = old_values;
        changes
    }
}

type ObjectCallback = dyn FnMut(&ObjectChanges);

/// Reports property additions, removals and changes of one object.
pub struct ObjectObserver {
    base: ObserverBase<ObjectCallback>,
    object: ObjectRef,
    tracking: RefCell<Tracking<IndexMap<String, Value>>>,
}

impl ObjectObserver {
    pub fn new(runtime: &Runtime, object: ObjectRef) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<ObjectObserver>| {
            let me: Weak<dyn Observer> = me.clone();
            Self {
                base: ObserverBase::new(runtime, me),
                object,
                tracking: RefCell::new(Tracking::Idle),
            }
        })
    }

    /// Opens the observer and returns the observed object.
    pub fn open(
        &self,
        callback: impl FnMut(&ObjectChanges) + 'static,
    ) -> Result<Value, ObserveError> {
        self.open_with(Callback::Typed(Box::new(callback)), false)
    }

    fn open_with(&self, callback: Callback<ObjectCallback>, nested: bool) -> Result<Value, ObserveError> {
        self.base.begin_open(callback, nested)?;
        self.connect();
        self.base.finish_open();
        Ok(self.value())
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }
}

impl Observer for ObjectObserver {
    fn id(&self) -> u64 {
        self.base.id()
    }

    fn state(&self) -> ObserverState {
        self.base.state()
    }

    fn value(&self) -> Value {
        Value::Object(self.object.clone())
    }

    fn open_forwarding(&self, notify: Box<dyn FnMut(&Value)>) -> Result<Value, ObserveError> {
        self.open_with(Callback::Forward(notify), true)
    }

    fn close(&self) {
        if self.base.begin_close() {
            self.disconnect();
        }
    }

    fn deliver(&self) {
        if !self.base.can_deliver() {
            return;
        }
        let observed = self.tracking.borrow().observed();
        match observed {
            Some(observed) => observed.deliver(false),
            None => {
                self.base.runtime().dirty_check(self);
            }
        }
    }

    fn discard_changes(&self) -> Value {
        let observed = self.tracking.borrow().observed();
        match observed {
            Some(observed) => observed.deliver(true),
            None => {
                if let Tracking::Shadow(shadow) = &mut *self.tracking.borrow_mut() {
                    *shadow = self.object.snapshot();
                }
            }
        }
        self.value()
    }

    fn connect(&self) {
        let runtime = self.base.runtime();
        let tracking = match self.base.handle() {
            Some(handle) if runtime.is_native() => {
                Tracking::Native(runtime.observed_object(&handle, &self.value()))
            }
            _ => Tracking::Shadow(self.object.snapshot()),
        };
        *self.tracking.borrow_mut() = tracking;
    }

    fn disconnect(&self) {
        let tracking = self.tracking.replace(Tracking::Idle);
        if let Tracking::Native(observed) = tracking {
            self.base.runtime().release_observed_object(observed);
        }
    }

    fn check(&self, records: Option<&[ChangeRecord]>, skip_changes: bool) -> bool {
        let changes = {
            let mut tracking = self.tracking.borrow_mut();
            match &mut *tracking {
                Tracking::Idle => return false,
                Tracking::Native(_) => match records {
                    Some(records) if !skip_changes => {
                        ObjectChanges::from_records(&self.object, records)
                    }
                    _ => return false,
                },
                Tracking::Shadow(shadow) => {
                    let changes = ObjectChanges::from_shadow(&self.object, shadow);
                    if !changes.is_empty() || skip_changes {
                        *shadow = self.object.snapshot();
                    }
                    changes
                }
            }
        };
        if skip_changes || changes.is_empty() {
            return false;
        }
        self.base
            .report(&self.value(), |callback| callback(&changes));
        true
    }

    /// Object observers watch their object directly and contribute nothing
    /// to shared dependency walks.
    fn iterate_objects(&self, _visit: &mut dyn FnMut(&Value, &Key)) {}
}
