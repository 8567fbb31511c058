//! The observation registry.
//!
//! A [`Runtime`] owns everything that would otherwise be process-global:
//! the path cache, observer ids, the list of observers swept by dirty
//! checking, observed-set and observed-object pools, the native delivery
//! queue, end-of-microtask tasks and diagnostics. Cloning a runtime yields
//! another handle to the same registry.
//!
//! The runtime owns every open top-level observer. Dropping the last user
//! handle does not stop an observer; [`Observer::close`] does, and releases
//! it. Observers nested in a compound or transform are owned by it instead.
//!
//! # Example
//!
//! ```
//! use observe::observer::PathObserver;
//! use observe::runtime::Runtime;
//! use observe::value::Value;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let runtime = Runtime::dirty_checking();
//! let model = Value::from_json(&serde_json::json!({"a": {"b": 1}}));
//! let observer = PathObserver::new(&runtime, model.clone(), "a.b");
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! let initial = observer
//!     .open(move |new, old, _| sink.borrow_mut().push((new.clone(), old.clone())))
//!     .unwrap();
//! assert_eq!(initial, Value::from(1));
//!
//! runtime.path("a.b").set_value_from(&model, Value::from(2));
//! runtime.perform_microtask_checkpoint();
//! assert_eq!(*seen.borrow(), vec![(Value::from(2), Value::from(1))]);
//! ```

use crate::change_source::{change_source, ChangeSource};
use crate::config::{ChangeSourceKind, ObserveConfig};
use crate::observed_set::{ObservedObject, ObservedSet};
use crate::observer::{Observer, ObserverState};
use crate::path::{IntoPath, Path, PathCache};
use crate::value::Value;
use crate::watch::DeliveryQueue;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use tracing::{debug, error, trace, warn};

/// Outcome of one [`Runtime::perform_microtask_checkpoint`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckpointReport {
    /// Cycles run, including the final quiet one.
    pub cycles: usize,
    /// Whether any cycle observed a change.
    pub changed: bool,
    /// Whether the cycle cap stopped the loop while changes were still
    /// being reported.
    pub capped: bool,
    /// Whether the call returned immediately because a checkpoint was
    /// already running.
    pub reentrant: bool,
}

#[derive(Default)]
struct Stats {
    callback_faults: usize,
    capped_checkpoints: usize,
    last_checkpoint: Option<CheckpointReport>,
}

#[derive(Default)]
struct ObservedSets {
    by_root: HashMap<usize, Rc<ObservedSet>>,
    last: Option<Rc<ObservedSet>>,
    pool: Vec<Rc<ObservedSet>>,
}

type Task = Box<dyn FnOnce()>;

struct RuntimeInner {
    config: ObserveConfig,
    source: Box<dyn ChangeSource>,
    paths: RefCell<PathCache>,
    next_id: Cell<u64>,
    observers: RefCell<Vec<Rc<dyn Observer>>>,
    owned: RefCell<HashMap<u64, Rc<dyn Observer>>>,
    open_count: Cell<usize>,
    running: Cell<bool>,
    eom_tasks: RefCell<Vec<Task>>,
    queue: Rc<DeliveryQueue>,
    sets: RefCell<ObservedSets>,
    object_pool: RefCell<Vec<Rc<ObservedObject>>>,
    stats: RefCell<Stats>,
}

#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(ObserveConfig::default())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("open_observers", &self.inner.open_count.get())
            .finish_non_exhaustive()
    }
}

struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Runtime {
    pub fn new(config: ObserveConfig) -> Self {
        let source = change_source(config.change_source);
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                source,
                paths: RefCell::new(PathCache::new()),
                next_id: Cell::new(1),
                observers: RefCell::new(Vec::new()),
                owned: RefCell::new(HashMap::new()),
                open_count: Cell::new(0),
                running: Cell::new(false),
                eom_tasks: RefCell::new(Vec::new()),
                queue: Rc::new(DeliveryQueue::default()),
                sets: RefCell::new(ObservedSets::default()),
                object_pool: RefCell::new(Vec::new()),
                stats: RefCell::new(Stats::default()),
            }),
        }
    }

    pub fn dirty_checking() -> Self {
        Self::new(ObserveConfig::dirty_checking())
    }

    pub fn native() -> Self {
        Self::new(ObserveConfig::native())
    }

    pub fn config(&self) -> &ObserveConfig {
        &self.inner.config
    }

    pub fn change_source_kind(&self) -> ChangeSourceKind {
        self.inner.source.kind()
    }

    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Resolves a path through the runtime's cache.
    pub fn path(&self, path: impl IntoPath) -> Path {
        path.into_path(&mut self.inner.paths.borrow_mut())
    }

    pub fn path_cache_len(&self) -> usize {
        self.inner.paths.borrow().len()
    }

    // ── Checkpoints ─────────────────────────────────────────────────────

    /// Runs change-source cycles until one reports no change or the cycle
    /// cap is reached. Calls made while a checkpoint is already running
    /// return immediately.
    pub fn perform_microtask_checkpoint(&self) -> CheckpointReport {
        let inner = &self.inner;
        if inner.running.get() {
            trace!("checkpoint already running");
            return CheckpointReport {
                reentrant: true,
                ..CheckpointReport::default()
            };
        }
        inner.running.set(true);
        let _guard = RunningGuard(&inner.running);

        let max_cycles = inner.config.max_dirty_check_cycles.max(1);
        let mut cycles = 0;
        let mut any_changed = false;
        let mut changed;
        loop {
            cycles += 1;
            changed = inner.source.run_cycle(self);
            if self.run_end_of_microtask_tasks() {
                changed = true;
            }
            trace!(cycle = cycles, changed, "checkpoint cycle");
            any_changed |= changed;
            if !changed || cycles >= max_cycles {
                break;
            }
        }

        let report = CheckpointReport {
            cycles,
            changed: any_changed,
            capped: changed,
            reentrant: false,
        };
        let mut stats = inner.stats.borrow_mut();
        if report.capped {
            warn!(cycles, "checkpoint stopped at the cycle cap");
            stats.capped_checkpoints += 1;
        }
        stats.last_checkpoint = Some(report);
        report
    }

    /// Queues `task` to run at the end of the next checkpoint cycle. A cycle
    /// that ran tasks counts as changed.
    pub fn queue_end_of_microtask(&self, task: impl FnOnce() + 'static) {
        self.inner.eom_tasks.borrow_mut().push(Box::new(task));
    }

    fn run_end_of_microtask_tasks(&self) -> bool {
        let tasks = std::mem::take(&mut *self.inner.eom_tasks.borrow_mut());
        if tasks.is_empty() {
            return false;
        }
        for task in tasks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                let message = panic_message(payload.as_ref());
                error!(%message, "end-of-microtask task panicked");
                self.inner.stats.borrow_mut().callback_faults += 1;
            }
        }
        true
    }

    /// One dirty-checking pass over the collected observers.
    ///
    /// Observers are visited in registration order. Closed observers are
    /// dropped from the list; observers opened during the pass are
    /// appended after the survivors.
    pub fn sweep_observers(&self) -> bool {
        let to_check = std::mem::take(&mut *self.inner.observers.borrow_mut());
        let mut survivors = Vec::with_capacity(to_check.len());
        let mut any_changed = false;

        for observer in to_check {
            match observer.state() {
                ObserverState::Closed => continue,
                ObserverState::Opened => {
                    if observer.check(None, false) {
                        any_changed = true;
                    }
                }
                ObserverState::Unopened | ObserverState::Resetting => {}
            }
            if observer.state() != ObserverState::Closed {
                survivors.push(observer);
            }
        }

        let mut list = self.inner.observers.borrow_mut();
        survivors.append(&mut list);
        *list = survivors;
        any_changed
    }

    /// Delivers every native watch queued so far.
    pub fn flush_deliveries(&self) -> bool {
        self.inner.queue.flush()
    }

    // ── Diagnostics ─────────────────────────────────────────────────────

    pub fn open_observer_count(&self) -> usize {
        self.inner.open_count.get()
    }

    /// Observers currently in the dirty-checking list.
    pub fn collected_observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    pub fn last_checkpoint(&self) -> Option<CheckpointReport> {
        self.inner.stats.borrow().last_checkpoint
    }

    pub fn callback_fault_count(&self) -> usize {
        self.inner.stats.borrow().callback_faults
    }

    pub fn capped_checkpoint_count(&self) -> usize {
        self.inner.stats.borrow().capped_checkpoints
    }

    pub fn observed_set_count(&self) -> usize {
        self.inner.sets.borrow().by_root.len()
    }

    pub fn pooled_observed_set_count(&self) -> usize {
        self.inner.sets.borrow().pool.len()
    }

    pub fn pending_delivery_count(&self) -> usize {
        self.inner.queue.len()
    }

    /// Test-support hook: clears caches, pools, queued work, the collected
    /// observer list, ownership of open observers and diagnostics.
    pub fn reset(&self) {
        let inner = &self.inner;
        inner.paths.borrow_mut().clear();
        let released = (
            std::mem::take(&mut *inner.observers.borrow_mut()),
            std::mem::take(&mut *inner.owned.borrow_mut()),
        );
        drop(released);
        inner.open_count.set(0);
        inner.eom_tasks.borrow_mut().clear();
        inner.queue.clear();
        *inner.sets.borrow_mut() = ObservedSets::default();
        inner.object_pool.borrow_mut().clear();
        *inner.stats.borrow_mut() = Stats::default();
    }

    // ── Observer plumbing ───────────────────────────────────────────────

    pub(crate) fn next_observer_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    pub(crate) fn is_native(&self) -> bool {
        self.inner.source.kind() == ChangeSourceKind::NativeNotification
    }

    pub(crate) fn observer_opened(&self, observer: Option<Rc<dyn Observer>>, nested: bool) {
        self.inner.open_count.set(self.inner.open_count.get() + 1);
        let Some(observer) = observer.filter(|_| !nested) else {
            return;
        };
        if self.inner.source.collects_observers() {
            self.inner.observers.borrow_mut().push(observer.clone());
        }
        self.inner.owned.borrow_mut().insert(observer.id(), observer);
    }

    pub(crate) fn observer_closed(&self, observer_id: u64) {
        let count = self.inner.open_count.get();
        self.inner.open_count.set(count.saturating_sub(1));
        let released = self.inner.owned.borrow_mut().remove(&observer_id);
        drop(released);
    }

    /// Re-checks one observer until it settles.
    pub(crate) fn dirty_check(&self, observer: &dyn Observer) -> bool {
        let max_cycles = self.inner.config.max_dirty_check_cycles.max(1);
        let mut cycles = 0;
        while cycles < max_cycles && observer.check(None, false) {
            cycles += 1;
        }
        cycles > 0
    }

    pub(crate) fn record_fault(&self, observer_id: u64, payload: Box<dyn Any + Send>) {
        let message = panic_message(payload.as_ref());
        error!(observer = observer_id, %message, "observer callback panicked");
        self.inner.stats.borrow_mut().callback_faults += 1;
    }

    /// Joins `observer` to the set shared by everything rooted at `root`.
    /// Primitive roots have nothing to watch.
    pub(crate) fn observed_set(
        &self,
        observer: &Rc<dyn Observer>,
        root: &Value,
    ) -> Option<Rc<ObservedSet>> {
        let root_identity = root.identity()?;
        let set = {
            let mut sets = self.inner.sets.borrow_mut();
            let cached = sets
                .last
                .as_ref()
                .filter(|set| set.root_identity() == Some(root_identity))
                .cloned();
            let set = match cached.or_else(|| sets.by_root.get(&root_identity).cloned()) {
                Some(set) => set,
                None => {
                    let set = sets
                        .pool
                        .pop()
                        .unwrap_or_else(|| ObservedSet::new(&self.inner.queue));
                    set.set_root(root.clone());
                    sets.by_root.insert(root_identity, set.clone());
                    debug!(root = root_identity, "observed set created");
                    set
                }
            };
            sets.last = Some(set.clone());
            set
        };
        set.open(observer);
        Some(set)
    }

    pub(crate) fn release_observed_set(&self, set: &Rc<ObservedSet>, observer_id: u64) {
        let root_identity = set.root_identity();
        if !set.close(observer_id) {
            return;
        }
        let mut sets = self.inner.sets.borrow_mut();
        if let Some(root_identity) = root_identity {
            if sets
                .by_root
                .get(&root_identity)
                .is_some_and(|current| Rc::ptr_eq(current, set))
            {
                sets.by_root.remove(&root_identity);
            }
        }
        if sets.last.as_ref().is_some_and(|last| Rc::ptr_eq(last, set)) {
            sets.last = None;
        }
        sets.pool.push(set.clone());
        debug!(root = ?root_identity, objects = set.object_count(), "observed set pooled");
    }

    pub(crate) fn observed_object(
        &self,
        observer: &Rc<dyn Observer>,
        object: &Value,
    ) -> Rc<ObservedObject> {
        let pooled = self.inner.object_pool.borrow_mut().pop();
        let observed = pooled.unwrap_or_else(|| ObservedObject::new(&self.inner.queue));
        observed.open(observer, object);
        observed
    }

    pub(crate) fn release_observed_object(&self, observed: Rc<ObservedObject>) {
        observed.close();
        self.inner.object_pool.borrow_mut().push(observed);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn paths_are_interned_per_runtime() {
        let a = Runtime::dirty_checking();
        let b = Runtime::dirty_checking();
        assert!(a.path("x.y").ptr_eq(&a.path("x . y")));
        assert!(!a.path("x.y").ptr_eq(&b.path("x.y")));
        assert!(!a.path("x..y").is_valid());
    }

    #[test]
    fn idle_checkpoint_runs_one_quiet_cycle() {
        let runtime = Runtime::native();
        let report = runtime.perform_microtask_checkpoint();
        assert_eq!(
            report,
            CheckpointReport {
                cycles: 1,
                changed: false,
                capped: false,
                reentrant: false
            }
        );
        assert_eq!(runtime.last_checkpoint(), Some(report));
    }

    #[test]
    fn end_of_microtask_tasks_chain_into_later_cycles() {
        let runtime = Runtime::dirty_checking();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (first, handle) = (log.clone(), runtime.clone());
        runtime.queue_end_of_microtask(move || {
            first.borrow_mut().push("first");
            let second = first.clone();
            handle.queue_end_of_microtask(move || second.borrow_mut().push("second"));
        });
        let report = runtime.perform_microtask_checkpoint();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(report.cycles, 3);
        assert!(report.changed);
    }

    #[test]
    fn panicking_task_is_counted() {
        let runtime = Runtime::dirty_checking();
        runtime.queue_end_of_microtask(|| panic!("task failed"));
        let report = runtime.perform_microtask_checkpoint();
        assert!(report.changed);
        assert_eq!(runtime.callback_fault_count(), 1);
    }

    #[test]
    fn panic_messages() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "non-string panic payload");
    }

    #[test]
    fn reset_clears_state() {
        let runtime = Runtime::dirty_checking();
        runtime.path("a.b");
        runtime.queue_end_of_microtask(|| {});
        runtime.reset();
        assert_eq!(runtime.path_cache_len(), 0);
        assert_eq!(runtime.perform_microtask_checkpoint().cycles, 1);
        runtime.reset();
        assert_eq!(runtime.last_checkpoint(), None);
    }
}
