//! Shared native watches.
//!
//! An [`ObservedSet`] serves every path-based observer rooted at the same
//! object with a single watch. The watch is installed lazily on each object
//! the observers' dependency walks reach. When records arrive, every
//! observer first re-walks its dependencies (picking up newly reachable
//! objects) and is then re-checked. Batches that only touch root
//! properties no observer reads are dropped.
//!
//! An [`ObservedObject`] is the single-object counterpart used by object and
//! array observers. Both are pooled by the runtime.

use crate::observer::{Observer, ObserverState};
use crate::path::Key;
use crate::record::ChangeRecord;
use crate::value::Value;
use crate::watch::{DeliveryQueue, Watch};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

pub(crate) struct ObservedSet {
    watch: Rc<Watch>,
    root: RefCell<Value>,
    root_props: RefCell<HashSet<String>>,
    objects: RefCell<Vec<Value>>,
    observers: RefCell<Vec<(u64, Weak<dyn Observer>)>>,
}

impl ObservedSet {
    pub(crate) fn new(queue: &Rc<DeliveryQueue>) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<ObservedSet>| {
            let me = me.clone();
            Self {
                watch: Watch::new(queue, move |records| {
                    if let Some(set) = me.upgrade() {
                        set.on_records(&records);
                    }
                }),
                root: RefCell::new(Value::Undefined),
                root_props: RefCell::new(HashSet::new()),
                objects: RefCell::new(Vec::new()),
                observers: RefCell::new(Vec::new()),
            }
        })
    }

    pub(crate) fn root_identity(&self) -> Option<usize> {
        self.root.borrow().identity()
    }

    pub(crate) fn set_root(&self, root: Value) {
        *self.root.borrow_mut() = root;
        self.root_props.borrow_mut().clear();
    }

    pub(crate) fn object_count(&self) -> usize {
        self.objects.borrow().len()
    }

    pub(crate) fn open(&self, observer: &Rc<dyn Observer>) {
        self.observers
            .borrow_mut()
            .push((observer.id(), Rc::downgrade(observer)));
        observer.iterate_objects(&mut |object, key| self.observe(object, key));
    }

    /// Drops `observer_id`. Returns `true` when that was the last observer;
    /// the set has then released every watch and is ready for reuse.
    pub(crate) fn close(&self, observer_id: u64) -> bool {
        let empty = {
            let mut observers = self.observers.borrow_mut();
            observers.retain(|(id, _)| *id != observer_id);
            observers.is_empty()
        };
        if !empty {
            return false;
        }

        for object in self.objects.borrow_mut().drain(..) {
            self.watch.unobserve(&object);
        }
        self.watch.discard();
        self.set_root(Value::Undefined);
        true
    }

    fn observe(&self, object: &Value, key: &Key) {
        let Some(identity) = object.identity() else {
            return;
        };
        if self.root_identity() == Some(identity) {
            self.root_props.borrow_mut().insert(key.to_string());
        }
        let mut objects = self.objects.borrow_mut();
        if objects.iter().any(|o| o.identity() == Some(identity)) {
            return;
        }
        objects.push(object.clone());
        self.watch.observe(object);
    }

    fn on_records(&self, records: &[ChangeRecord]) {
        let ignored = {
            let root = self.root.borrow();
            touches_only_unread_root_props(&root, &self.root_props.borrow(), records)
        };
        if ignored {
            return;
        }

        let observers: Vec<Rc<dyn Observer>> = self
            .observers
            .borrow()
            .iter()
            .filter_map(|(_, observer)| observer.upgrade())
            .collect();

        for observer in &observers {
            if observer.state() == ObserverState::Opened {
                observer.iterate_objects(&mut |object, key| self.observe(object, key));
            }
        }
        for observer in &observers {
            if observer.state() == ObserverState::Opened {
                observer.check(None, false);
            }
        }
    }
}

/// True when every record is a named change on `root` to a property none
/// of the observers has read.
fn touches_only_unread_root_props(
    root: &Value,
    read: &HashSet<String>,
    records: &[ChangeRecord],
) -> bool {
    let Some(root_identity) = root.identity() else {
        return false;
    };
    records.iter().all(|record| {
        record.object.identity() == Some(root_identity)
            && record.name().is_some_and(|name| !read.contains(name))
    })
}

pub(crate) struct ObservedObject {
    watch: Rc<Watch>,
    observer: RefCell<Option<Weak<dyn Observer>>>,
    object: RefCell<Value>,
    discarding: Cell<bool>,
}

impl ObservedObject {
    pub(crate) fn new(queue: &Rc<DeliveryQueue>) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<ObservedObject>| {
            let me = me.clone();
            Self {
                watch: Watch::new(queue, move |records| {
                    if let Some(observed) = me.upgrade() {
                        observed.on_records(records);
                    }
                }),
                observer: RefCell::new(None),
                object: RefCell::new(Value::Undefined),
                discarding: Cell::new(false),
            }
        })
    }

    pub(crate) fn open(&self, observer: &Rc<dyn Observer>, object: &Value) {
        // Records left over from a previous owner.
        self.watch.discard();
        *self.observer.borrow_mut() = Some(Rc::downgrade(observer));
        *self.object.borrow_mut() = object.clone();
        self.watch.observe(object);
    }

    /// Delivers pending records now; with `discard` they are dropped
    /// instead of reaching the observer.
    pub(crate) fn deliver(&self, discard: bool) {
        self.discarding.set(discard);
        self.watch.deliver();
        self.discarding.set(false);
    }

    pub(crate) fn close(&self) {
        let object = std::mem::take(&mut *self.object.borrow_mut());
        self.watch.unobserve(&object);
        self.watch.discard();
        *self.observer.borrow_mut() = None;
    }

    fn on_records(&self, records: Vec<ChangeRecord>) {
        if self.discarding.get() {
            return;
        }
        let observer = self.observer.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            if observer.state() == ObserverState::Opened {
                observer.check(Some(&records), false);
            }
        }
    }
}
