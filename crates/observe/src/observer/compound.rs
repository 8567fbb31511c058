use super::base::{Callback, ObserverBase};
use super::{Observer, ObserverState};
use crate::error::ObserveError;
use crate::observed_set::ObservedSet;
use crate::path::{IntoPath, Key, Path};
use crate::record::ChangeRecord;
use crate::runtime::Runtime;
use crate::value::{same_value, ArrayRef, Value};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// One input of a [`CompoundObserver`].
#[derive(Clone)]
pub enum Dependency {
    Path { object: Value, path: Path },
    Observer(Rc<dyn Observer>),
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dependency::Path { object, path } => f
                .debug_struct("Path")
                .field("object", object)
                .field("path", path)
                .finish(),
            Dependency::Observer(observer) => f.debug_tuple("Observer").field(observer).finish(),
        }
    }
}

/// What a [`CompoundObserver`] reports.
#[derive(Debug, Clone)]
pub struct CompoundChanges {
    /// Current value of every dependency, in registration order.
    pub values: Vec<Value>,
    /// Previous value at each index that changed; `None` elsewhere.
    pub old_values: Vec<Option<Value>>,
    pub observed: Vec<Dependency>,
}

impl CompoundChanges {
    /// Indices whose value changed.
    pub fn changed_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.old_values
            .iter()
            .enumerate()
            .filter_map(|(index, old)| old.as_ref().map(|_| index))
    }
}

type CompoundCallback = dyn FnMut(&CompoundChanges);

/// Aggregates any number of paths and nested observers into one value
/// vector and reports at most once per check, whatever number of inputs
/// changed.
///
/// Dependencies can only be added before opening or between
/// [`start_reset`](Self::start_reset) and [`finish_reset`](Self::finish_reset).
pub struct CompoundObserver {
    base: ObserverBase<CompoundCallback>,
    report_changes_on_open: bool,
    observed: RefCell<Vec<Dependency>>,
    values: ArrayRef,
    observed_set: RefCell<Option<Rc<ObservedSet>>>,
    checking: Cell<bool>,
}

impl CompoundObserver {
    pub fn new(runtime: &Runtime, report_changes_on_open: bool) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<CompoundObserver>| {
            let me: Weak<dyn Observer> = me.clone();
            Self {
                base: ObserverBase::new(runtime, me),
                report_changes_on_open,
                observed: RefCell::new(Vec::new()),
                values: ArrayRef::new(),
                observed_set: RefCell::new(None),
                checking: Cell::new(false),
            }
        })
    }

    /// Opens the observer and returns the value array. The array keeps its
    /// identity for the observer's whole life.
    pub fn open(
        &self,
        callback: impl FnMut(&CompoundChanges) + 'static,
    ) -> Result<Value, ObserveError> {
        self.open_with(Callback::Typed(Box::new(callback)), false)
    }

    fn open_with(&self, callback: Callback<CompoundCallback>, nested: bool) -> Result<Value, ObserveError> {
        self.base.begin_open(callback, nested)?;
        self.connect();
        self.base.finish_open();
        Ok(self.value())
    }

    fn accepts_dependencies(&self) -> Result<(), ObserveError> {
        match self.base.state() {
            ObserverState::Unopened | ObserverState::Resetting => Ok(()),
            ObserverState::Opened | ObserverState::Closed => Err(ObserveError::DependenciesLocked),
        }
    }

    pub fn add_path(&self, object: impl Into<Value>, path: impl IntoPath) -> Result<(), ObserveError> {
        self.accepts_dependencies()?;
        let object = object.into();
        let path = self.base.runtime().path(path);
        let index = {
            let mut observed = self.observed.borrow_mut();
            observed.push(Dependency::Path {
                object: object.clone(),
                path: path.clone(),
            });
            observed.len() - 1
        };
        if self.report_changes_on_open {
            self.values.set(index, path.get_value_from(&object));
        }
        Ok(())
    }

    pub fn add_observer(&self, observer: Rc<dyn Observer>) -> Result<(), ObserveError> {
        self.accepts_dependencies()?;
        let index = {
            let mut observed = self.observed.borrow_mut();
            observed.push(Dependency::Observer(observer.clone()));
            observed.len() - 1
        };
        if self.report_changes_on_open {
            let value = observer.open_forwarding(self.forward_to_self())?;
            self.values.set(index, value);
        }
        Ok(())
    }

    /// Tears down every dependency so that a new set can be added.
    pub fn start_reset(&self) -> Result<(), ObserveError> {
        if self.base.state() != ObserverState::Opened {
            return Err(ObserveError::NotOpen);
        }
        self.base.set_state(ObserverState::Resetting);
        self.disconnect();
        Ok(())
    }

    /// Reconnects after a reset and returns the value array.
    pub fn finish_reset(&self) -> Result<Value, ObserveError> {
        if self.base.state() != ObserverState::Resetting {
            return Err(ObserveError::NotResetting);
        }
        self.base.set_state(ObserverState::Opened);
        self.connect();
        Ok(self.value())
    }

    pub fn dependencies(&self) -> Vec<Dependency> {
        self.observed.borrow().clone()
    }

    fn forward_to_self(&self) -> Box<dyn FnMut(&Value)> {
        let me = self.base.me().clone();
        Box::new(move |_| {
            if let Some(owner) = me.upgrade() {
                owner.deliver();
            }
        })
    }

    fn dependency_value(&self, dependency: &Dependency) -> Value {
        match dependency {
            Dependency::Path { object, path } => path.get_value_from(object),
            Dependency::Observer(observer) => match observer.state() {
                ObserverState::Unopened => observer
                    .open_forwarding(self.forward_to_self())
                    .unwrap_or_default(),
                _ => observer.discard_changes(),
            },
        }
    }
}

impl Observer for CompoundObserver {
    fn id(&self) -> u64 {
        self.base.id()
    }

    fn state(&self) -> ObserverState {
        self.base.state()
    }

    fn value(&self) -> Value {
        Value::Array(self.values.clone())
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

    fn connect(&self) {
        let runtime = self.base.runtime();
        if runtime.is_native() {
            let root = self.observed.borrow().iter().find_map(|dependency| match dependency {
                Dependency::Path { object, .. } => Some(object.clone()),
                Dependency::Observer(_) => None,
            });
            if let (Some(root), Some(handle)) = (root, self.base.handle()) {
                *self.observed_set.borrow_mut() = runtime.observed_set(&handle, &root);
            }
        }
        self.check(None, !self.report_changes_on_open);
    }

    fn disconnect(&self) {
        let observed = std::mem::take(&mut *self.observed.borrow_mut());
        for dependency in observed {
            if let Dependency::Observer(observer) = dependency {
                observer.close();
            }
        }
        self.values.clear();
        let set = self.observed_set.borrow_mut().take();
        if let Some(set) = set {
            self.base.runtime().release_observed_set(&set, self.base.id());
        }
    }

    fn check(&self, _records: Option<&[ChangeRecord]>, skip_changes: bool) -> bool {
        // A nested observer forwarding into `deliver` while we are already
        // collecting values has nothing new to tell us.
        if self.checking.replace(true) {
            return false;
        }
        let observed = self.observed.borrow().clone();
        let mut old_values: Option<Vec<Option<Value>>> = None;
        for (index, dependency) in observed.iter().enumerate() {
            let value = self.dependency_value(dependency);
            if skip_changes {
                self.values.set(index, value);
                continue;
            }
            let previous = self.values.get(index);
            if same_value(&value, &previous) {
                continue;
            }
            old_values.get_or_insert_with(|| vec![None; observed.len()])[index] = Some(previous);
            self.values.set(index, value);
        }
        self.checking.set(false);

        let Some(old_values) = old_values else {
            return false;
        };
        let changes = CompoundChanges {
            values: self.values.to_vec(),
            old_values,
            observed,
        };
        self.base
            .report(&self.value(), |callback| callback(&changes));
        true
    }

    fn iterate_objects(&self, visit: &mut dyn FnMut(&Value, &Key)) {
        let observed = self.observed.borrow().clone();
        for dependency in &observed {
            if let Dependency::Path { object, path } = dependency {
                path.iterate_objects(object, visit);
            }
        }
    }
}
