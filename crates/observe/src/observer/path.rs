use super::base::{Callback, ObserverBase};
use super::{Observer, ObserverState};
use crate::error::ObserveError;
use crate::observed_set::ObservedSet;
use crate::path::{IntoPath, Key, Path};
use crate::record::ChangeRecord;
use crate::runtime::Runtime;
use crate::value::{same_value, Value};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type PathCallback = dyn FnMut(&Value, &Value, &PathObserver);

/// Watches the value found at one path below a root object.
///
/// The callback receives `(new, old, observer)`.
pub struct PathObserver {
    base: ObserverBase<PathCallback>,
    object: Value,
    path: Path,
    value: RefCell<Value>,
    observed_set: RefCell<Option<Rc<ObservedSet>>>,
}

impl PathObserver {
    pub fn new(runtime: &Runtime, object: impl Into<Value>, path: impl IntoPath) -> Rc<Self> {
        let path = runtime.path(path);
        let object = object.into();
        Rc::new_cyclic(|me: &Weak<PathObserver>| {
            let me: Weak<dyn Observer> = me.clone();
            Self {
                base: ObserverBase::new(runtime, me),
                object,
                path,
                value: RefCell::new(Value::Undefined),
                observed_set: RefCell::new(None),
            }
        })
    }

    /// Opens the observer and returns the current value.
    pub fn open(
        &self,
        callback: impl FnMut(&Value, &Value, &PathObserver) + 'static,
    ) -> Result<Value, ObserveError> {
        self.open_with(Callback::Typed(Box::new(callback)), false)
    }

    fn open_with(&self, callback: Callback<PathCallback>, nested: bool) -> Result<Value, ObserveError> {
        self.base.begin_open(callback, nested)?;
        self.connect();
        self.base.finish_open();
        Ok(self.value())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn object(&self) -> &Value {
        &self.object
    }
}

impl Observer for PathObserver {
    fn id(&self) -> u64 {
        self.base.id()
    }

    fn state(&self) -> ObserverState {
        self.base.state()
    }

    fn value(&self) -> Value {
        self.value.borrow().clone()
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
        if self.base.can_deliver() {
            self.base.runtime().dirty_check(self);
        }
    }

    fn discard_changes(&self) -> Value {
        self.check(None, true);
        self.value()
    }

    fn set_value(&self, value: Value) -> bool {
        self.path.set_value_from(&self.object, value)
    }

    fn connect(&self) {
        let runtime = self.base.runtime();
        if runtime.is_native() {
            if let Some(handle) = self.base.handle() {
                *self.observed_set.borrow_mut() = runtime.observed_set(&handle, &self.object);
            }
        }
        self.check(None, true);
    }

    fn disconnect(&self) {
        *self.value.borrow_mut() = Value::Undefined;
        let set = self.observed_set.borrow_mut().take();
        if let Some(set) = set {
            self.base.runtime().release_observed_set(&set, self.base.id());
        }
    }

    fn check(&self, _records: Option<&[ChangeRecord]>, skip_changes: bool) -> bool {
        let new = self.path.get_value_from(&self.object);
        let old = self.value.replace(new.clone());
        if skip_changes || same_value(&new, &old) {
            return false;
        }
        self.base.report(&new, |callback| callback(&new, &old, self));
        true
    }

    fn iterate_objects(&self, visit: &mut dyn FnMut(&Value, &Key)) {
        self.path.iterate_objects(&self.object, visit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectRef;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn reports_new_and_old_value() {
        let runtime = Runtime::dirty_checking();
        let model = Value::from_json(&json!({"a": {"b": 1}}));
        let observer = PathObserver::new(&runtime, model.clone(), "a.b");
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        let initial = observer
            .open(move |new, old, _| sink.borrow_mut().push((new.clone(), old.clone())))
            .unwrap();
        assert_eq!(initial, Value::from(1));

        observer.set_value(Value::from(2));
        observer.deliver();
        assert_eq!(*calls.borrow(), vec![(Value::from(2), Value::from(1))]);
    }

    #[test]
    fn discard_changes_swallows_echo() {
        let runtime = Runtime::dirty_checking();
        let object = ObjectRef::from_entries([("x", Value::from(1))]);
        let observer = PathObserver::new(&runtime, object.clone(), "x");
        let calls = Rc::new(Cell::new(0));
        let count = calls.clone();
        observer.open(move |_, _, _| count.set(count.get() + 1)).unwrap();

        object.set("x", Value::from(5));
        assert_eq!(observer.discard_changes(), Value::from(5));
        runtime.perform_microtask_checkpoint();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn nan_is_a_fixed_point() {
        let runtime = Runtime::dirty_checking();
        let object = ObjectRef::from_entries([("x", Value::Number(f64::NAN))]);
        let observer = PathObserver::new(&runtime, object, "x");
        observer.open(|_, _, _| panic!("NaN reported as a change")).unwrap();
        let report = runtime.perform_microtask_checkpoint();
        assert!(!report.changed);
        assert_eq!(runtime.callback_fault_count(), 0);
    }

    #[test]
    fn signed_zero_is_a_change() {
        let runtime = Runtime::dirty_checking();
        let object = ObjectRef::from_entries([("x", Value::Number(0.0))]);
        let observer = PathObserver::new(&runtime, object.clone(), "x");
        let calls = Rc::new(Cell::new(0));
        let count = calls.clone();
        observer.open(move |_, _, _| count.set(count.get() + 1)).unwrap();
        object.set("x", Value::Number(-0.0));
        runtime.perform_microtask_checkpoint();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn invalid_path_observes_undefined() {
        let runtime = Runtime::dirty_checking();
        let object = ObjectRef::new();
        let observer = PathObserver::new(&runtime, object, "a..b");
        assert!(!observer.path().is_valid());
        assert_eq!(observer.open(|_, _, _| {}).unwrap(), Value::Undefined);
        assert!(!observer.set_value(Value::from(1)));
    }
}
