use super::base::{Callback, ObserverBase};
use super::{Observer, ObserverState};
use crate::error::ObserveError;
use crate::path::Key;
use crate::record::ChangeRecord;
use crate::runtime::Runtime;
use crate::value::{same_value, Value};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type MapFn = Box<dyn Fn(&Value) -> Value>;
type TransformCallback = dyn FnMut(&Value, &Value);

/// Maps the value of an inner observer.
///
/// Change detection runs on the mapped value: inputs that map to the same
/// output are not reported. Writes are mapped back with the `set` function
/// and passed to the inner observer.
///
/// ```
/// use observe::observer::{Observer, ObserverTransform, PathObserver};
/// use observe::runtime::Runtime;
/// use observe::value::{ObjectRef, Value};
///
/// let runtime = Runtime::dirty_checking();
/// let object = ObjectRef::from_entries([("n", Value::from(2))]);
/// let inner = PathObserver::new(&runtime, object.clone(), "n");
/// let doubled = ObserverTransform::builder(inner)
///     .get(|v| Value::from(v.as_number().unwrap_or(0.0) * 2.0))
///     .set(|v| Value::from(v.as_number().unwrap_or(0.0) / 2.0))
///     .build(&runtime);
///
/// assert_eq!(doubled.open(|_, _| {}).unwrap(), Value::from(4));
/// assert!(doubled.set_value(Value::from(10)));
/// assert_eq!(object.get("n"), Value::from(5));
/// ```
pub struct ObserverTransform {
    base: ObserverBase<TransformCallback>,
    inner: Rc<dyn Observer>,
    get: MapFn,
    set: MapFn,
    pass_through_set: bool,
    value: RefCell<Value>,
}

pub struct TransformBuilder {
    inner: Rc<dyn Observer>,
    get: Option<MapFn>,
    set: Option<MapFn>,
    pass_through_set: bool,
}

impl TransformBuilder {
    /// Mapping applied to values coming out of the inner observer.
    pub fn get(mut self, map: impl Fn(&Value) -> Value + 'static) -> Self {
        self.get = Some(Box::new(map));
        self
    }

    /// Mapping applied to values written through the transform.
    pub fn set(mut self, map: impl Fn(&Value) -> Value + 'static) -> Self {
        self.set = Some(Box::new(map));
        self
    }

    /// Whether `set_value` reaches the inner observer. Defaults to `true`.
    pub fn pass_through_set(mut self, pass_through: bool) -> Self {
        self.pass_through_set = pass_through;
        self
    }

    pub fn build(self, runtime: &Runtime) -> Rc<ObserverTransform> {
        let identity = || -> MapFn { Box::new(Value::clone) };
        Rc::new_cyclic(|me: &Weak<ObserverTransform>| {
            let me: Weak<dyn Observer> = me.clone();
            ObserverTransform {
                base: ObserverBase::new(runtime, me),
                inner: self.inner,
                get: self.get.unwrap_or_else(identity),
                set: self.set.unwrap_or_else(identity),
                pass_through_set: self.pass_through_set,
                value: RefCell::new(Value::Undefined),
            }
        })
    }
}

impl ObserverTransform {
    pub fn builder(inner: Rc<dyn Observer>) -> TransformBuilder {
        TransformBuilder {
            inner,
            get: None,
            set: None,
            pass_through_set: true,
        }
    }

    /// Opens the transform, and with it the inner observer. The callback
    /// receives `(new, old)` mapped values.
    pub fn open(
        &self,
        callback: impl FnMut(&Value, &Value) + 'static,
    ) -> Result<Value, ObserveError> {
        self.open_with(Callback::Typed(Box::new(callback)), false)
    }

    fn open_with(&self, callback: Callback<TransformCallback>, nested: bool) -> Result<Value, ObserveError> {
        if self.inner.state() != ObserverState::Unopened {
            return Err(ObserveError::AlreadyOpened);
        }
        self.base.begin_open(callback, nested)?;
        self.connect();
        self.base.finish_open();
        Ok(self.value())
    }

    pub fn inner(&self) -> &Rc<dyn Observer> {
        &self.inner
    }
}

impl Observer for ObserverTransform {
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
        let mapped = (self.set)(&value);
        self.pass_through_set && self.inner.set_value(mapped)
    }

    fn connect(&self) {
        let me = self.base.me().clone();
        let opened = self.inner.open_forwarding(Box::new(move |_| {
            if let Some(transform) = me.upgrade() {
                transform.deliver();
            }
        }));
        let value = opened.map(|inner| (self.get)(&inner)).unwrap_or_default();
        *self.value.borrow_mut() = value;
    }

    fn disconnect(&self) {
        self.inner.close();
        *self.value.borrow_mut() = Value::Undefined;
    }

    fn check(&self, _records: Option<&[ChangeRecord]>, skip_changes: bool) -> bool {
        let new = (self.get)(&self.inner.discard_changes());
        let old = self.value.replace(new.clone());
        if skip_changes || same_value(&new, &old) {
            return false;
        }
        self.base.report(&new, |callback| callback(&new, &old));
        true
    }

    fn iterate_objects(&self, visit: &mut dyn FnMut(&Value, &Key)) {
        self.inner.iterate_objects(visit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::PathObserver;
    use crate::value::ObjectRef;

    #[test]
    fn mapping_to_same_output_is_silent() {
        let runtime = Runtime::dirty_checking();
        let object = ObjectRef::from_entries([("n", Value::from(2))]);
        let parity = ObserverTransform::builder(PathObserver::new(&runtime, object.clone(), "n"))
            .get(|v| Value::from(v.as_number().unwrap_or(0.0) % 2.0 == 0.0))
            .build(&runtime);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        assert_eq!(
            parity
                .open(move |new, old| sink.borrow_mut().push((new.clone(), old.clone())))
                .unwrap(),
            Value::Bool(true)
        );

        object.set("n", Value::from(4));
        runtime.perform_microtask_checkpoint();
        assert!(seen.borrow().is_empty());

        object.set("n", Value::from(5));
        runtime.perform_microtask_checkpoint();
        assert_eq!(*seen.borrow(), vec![(Value::Bool(false), Value::Bool(true))]);
    }

    #[test]
    fn set_without_pass_through_is_dropped() {
        let runtime = Runtime::dirty_checking();
        let object = ObjectRef::from_entries([("n", Value::from(1))]);
        let transform = ObserverTransform::builder(PathObserver::new(&runtime, object.clone(), "n"))
            .pass_through_set(false)
            .build(&runtime);
        transform.open(|_, _| {}).unwrap();
        assert!(!transform.set_value(Value::from(9)));
        assert_eq!(object.get("n"), Value::from(1));
    }

    #[test]
    fn close_closes_inner() {
        let runtime = Runtime::dirty_checking();
        let inner = PathObserver::new(&runtime, ObjectRef::new(), "n");
        let transform = ObserverTransform::builder(inner.clone()).build(&runtime);
        transform.open(|_, _| {}).unwrap();
        assert_eq!(inner.state(), ObserverState::Opened);
        assert_eq!(runtime.open_observer_count(), 2);
        transform.close();
        assert_eq!(inner.state(), ObserverState::Closed);
        assert_eq!(runtime.open_observer_count(), 0);
    }
}
