use super::base::{Callback, ObserverBase};
use super::object::Tracking;
use super::{Observer, ObserverState};
use crate::error::ObserveError;
use crate::path::Key;
use crate::record::ChangeRecord;
use crate::runtime::Runtime;
use crate::splice::{calculate_splices, project_array_splices, Splice};
use crate::value::{ArrayRef, Value};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type ArrayCallback = dyn FnMut(&[Splice<Value>]);

/// Reports how an array changed as an ordered list of splices.
pub struct ArrayObserver {
    base: ObserverBase<ArrayCallback>,
    array: ArrayRef,
    tracking: RefCell<Tracking<Vec<Value>>>,
}

impl ArrayObserver {
    pub fn new(runtime: &Runtime, array: impl Into<Value>) -> Result<Rc<Self>, ObserveError> {
        let Value::Array(array) = array.into() else {
            return Err(ObserveError::NotAnArray);
        };
        Ok(Rc::new_cyclic(|me: &Weak<ArrayObserver>| {
            let me: Weak<dyn Observer> = me.clone();
            Self {
                base: ObserverBase::new(runtime, me),
                array,
                tracking: RefCell::new(Tracking::Idle),
            }
        }))
    }

    /// Opens the observer and returns the observed array.
    pub fn open(
        &self,
        callback: impl FnMut(&[Splice<Value>]) + 'static,
    ) -> Result<Value, ObserveError> {
        self.open_with(Callback::Typed(Box::new(callback)), false)
    }

    fn open_with(&self, callback: Callback<ArrayCallback>, nested: bool) -> Result<Value, ObserveError> {
        self.base.begin_open(callback, nested)?;
        self.connect();
        self.base.finish_open();
        Ok(self.value())
    }

    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    /// Splices turning `previous` into `current`.
    pub fn calculate_splices(current: &[Value], previous: &[Value]) -> Vec<Splice<Value>> {
        calculate_splices(current, previous)
    }

    /// Replays `splices` on `previous`, taking added elements from
    /// `current`, so that it ends up matching `current`.
    pub fn apply_splices(previous: &ArrayRef, current: &[Value], splices: &[Splice<Value>]) {
        for splice in splices {
            let added = current
                .iter()
                .skip(splice.index)
                .take(splice.added_count)
                .cloned();
            previous.splice(splice.index, splice.removed.len(), added);
        }
    }
}

impl Observer for ArrayObserver {
    fn id(&self) -> u64 {
        self.base.id()
    }

    fn state(&self) -> ObserverState {
        self.base.state()
    }

    fn value(&self) -> Value {
        Value::Array(self.array.clone())
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
                    *shadow = self.array.to_vec();
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
            _ => Tracking::Shadow(self.array.to_vec()),
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
        let splices = {
            let mut tracking = self.tracking.borrow_mut();
            match &mut *tracking {
                Tracking::Idle => return false,
                Tracking::Native(_) => match records {
                    Some(records) if !skip_changes => {
                        project_array_splices(&self.array.to_vec(), records)
                    }
                    _ => return false,
                },
                Tracking::Shadow(shadow) => {
                    let current = self.array.to_vec();
                    let splices = calculate_splices(&current, shadow);
                    if !splices.is_empty() || skip_changes {
                        *shadow = current;
                    }
                    splices
                }
            }
        };
        if skip_changes || splices.is_empty() {
            return false;
        }
        self.base
            .report(&self.value(), |callback| callback(&splices));
        true
    }

    /// Array observers watch their array directly and contribute nothing
    /// to shared dependency walks.
    fn iterate_objects(&self, _visit: &mut dyn FnMut(&Value, &Key)) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[i32]) -> Vec<Value> {
        items.iter().copied().map(Value::from).collect()
    }

    #[test]
    fn rejects_non_arrays() {
        let runtime = Runtime::dirty_checking();
        assert_eq!(
            ArrayObserver::new(&runtime, Value::from(3)).err(),
            Some(ObserveError::NotAnArray)
        );
    }

    #[test]
    fn apply_splices_syncs_a_copy() {
        let previous = values(&[1, 2, 3, 4]);
        let current = values(&[0, 1, 5, 6, 4, 7]);
        let copy = ArrayRef::from_vec(previous.clone());
        let splices = ArrayObserver::calculate_splices(&current, &previous);
        ArrayObserver::apply_splices(&copy, &current, &splices);
        assert!(Value::Array(copy).deep_equals(&Value::from(current)));
    }

    #[test]
    fn dirty_observer_reports_splices() {
        let runtime = Runtime::dirty_checking();
        let array = ArrayRef::from_vec(values(&[1, 2, 3, 4]));
        let observer = ArrayObserver::new(&runtime, array.clone()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        observer
            .open(move |splices| sink.borrow_mut().push(splices.to_vec()))
            .unwrap();

        array.splice(1, 2, values(&[5, 6]));
        runtime.perform_microtask_checkpoint();
        assert_eq!(
            *seen.borrow(),
            vec![vec![Splice::new(1, values(&[2, 3]), 2)]]
        );
    }
}
