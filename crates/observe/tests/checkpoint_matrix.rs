mod common;

use common::{log, runtimes};
use observe::{
    CheckpointReport, ObjectRef, ObserveConfig, Observer, PathObserver, Runtime, Value,
};
use std::cell::Cell;
use std::rc::Rc;

fn incrementing_observer(runtime: &Runtime, object: &ObjectRef) -> Rc<PathObserver> {
    let observer = PathObserver::new(runtime, object.clone(), "n");
    let target = object.clone();
    observer
        .open(move |new, _, _| {
            let next = new.as_number().unwrap_or(0.0) + 1.0;
            target.set("n", Value::from(next));
        })
        .unwrap();
    observer
}

#[test]
fn quiet_checkpoint_is_one_cycle() {
    for (mode, runtime) in runtimes() {
        let object = ObjectRef::from_entries([("n", Value::from(0))]);
        let observer = PathObserver::new(&runtime, object, "n");
        observer.open(|_, _, _| {}).unwrap();

        let report = runtime.perform_microtask_checkpoint();
        assert_eq!(
            report,
            CheckpointReport {
                cycles: 1,
                changed: false,
                capped: false,
                reentrant: false
            },
            "{mode}"
        );
        assert_eq!(runtime.perform_microtask_checkpoint(), report, "{mode}");
    }
}

#[test]
fn feedback_loop_stops_at_the_cycle_cap() {
    for config in [ObserveConfig::dirty_checking(), ObserveConfig::native()] {
        let runtime = Runtime::new(config.clone().with_max_dirty_check_cycles(10));
        let object = ObjectRef::from_entries([("n", Value::from(0))]);
        let _observer = incrementing_observer(&runtime, &object);

        object.set("n", Value::from(1));
        let report = runtime.perform_microtask_checkpoint();
        assert_eq!(report.cycles, 10, "{config:?}");
        assert!(report.changed, "{config:?}");
        assert!(report.capped, "{config:?}");
        assert_eq!(object.get("n"), Value::from(11), "{config:?}");
        assert_eq!(runtime.capped_checkpoint_count(), 1, "{config:?}");
        assert_eq!(runtime.last_checkpoint(), Some(report), "{config:?}");
    }
}

#[test]
fn settling_chain_terminates_in_registration_order() {
    for (mode, runtime) in runtimes() {
        let object = ObjectRef::from_entries([("x", Value::from(0)), ("y", Value::from(0))]);
        let order = log();

        let forward = PathObserver::new(&runtime, object.clone(), "x");
        let (sink, target) = (order.clone(), object.clone());
        forward
            .open(move |new, _, _| {
                sink.borrow_mut().push("x");
                target.set("y", new.clone());
            })
            .unwrap();

        let tail = PathObserver::new(&runtime, object.clone(), "y");
        let sink = order.clone();
        tail.open(move |_, _, _| sink.borrow_mut().push("y")).unwrap();

        object.set("x", Value::from(5));
        let report = runtime.perform_microtask_checkpoint();
        assert!(report.changed, "{mode}");
        assert!(!report.capped, "{mode}");
        assert!(report.cycles < observe::MAX_DIRTY_CHECK_CYCLES, "{mode}");
        assert_eq!(*order.borrow(), vec!["x", "y"], "{mode}");
        assert_eq!(tail.value(), Value::from(5), "{mode}");
    }
}

#[test]
fn nested_checkpoint_requests_are_ignored() {
    for (mode, runtime) in runtimes() {
        let object = ObjectRef::from_entries([("n", Value::from(0))]);
        let observer = PathObserver::new(&runtime, object.clone(), "n");
        let nested = log();
        let (sink, handle) = (nested.clone(), runtime.clone());
        observer
            .open(move |_, _, _| sink.borrow_mut().push(handle.perform_microtask_checkpoint()))
            .unwrap();

        object.set("n", Value::from(1));
        let outer = runtime.perform_microtask_checkpoint();

        let nested = nested.borrow();
        assert_eq!(nested.len(), 1, "{mode}");
        assert!(nested[0].reentrant, "{mode}");
        assert_eq!(nested[0].cycles, 0, "{mode}");
        assert!(!outer.reentrant, "{mode}");
        assert_eq!(runtime.last_checkpoint(), Some(outer), "{mode}");

        observer.close();
    }
}

#[test]
fn end_of_microtask_tasks_run_inside_the_checkpoint() {
    for (mode, runtime) in runtimes() {
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        runtime.queue_end_of_microtask(move || flag.set(true));

        let report = runtime.perform_microtask_checkpoint();
        assert!(ran.get(), "{mode}");
        assert_eq!(report.cycles, 2, "{mode}");
        assert!(report.changed, "{mode}");
    }
}

#[test]
fn tasks_see_changes_made_by_callbacks() {
    for (mode, runtime) in runtimes() {
        let object = ObjectRef::from_entries([("n", Value::from(0))]);
        let observer = PathObserver::new(&runtime, object.clone(), "n");
        let seen = log();
        let (sink, handle) = (seen.clone(), runtime.clone());
        observer
            .open(move |new, _, _| {
                let (sink, new) = (sink.clone(), new.clone());
                handle.queue_end_of_microtask(move || sink.borrow_mut().push(new));
            })
            .unwrap();

        object.set("n", Value::from(3));
        runtime.perform_microtask_checkpoint();
        assert_eq!(*seen.borrow(), vec![Value::from(3)], "{mode}");
        observer.close();
    }
}

#[test]
fn reset_clears_registry_state() {
    for (mode, runtime) in runtimes() {
        let object = ObjectRef::from_entries([("n", Value::from(0))]);
        let _observer = incrementing_observer(&runtime, &object);
        runtime.path("a.b.c");
        object.set("n", Value::from(1));
        runtime.perform_microtask_checkpoint();

        runtime.reset();
        assert_eq!(runtime.open_observer_count(), 0, "{mode}");
        assert_eq!(runtime.collected_observer_count(), 0, "{mode}");
        assert_eq!(runtime.observed_set_count(), 0, "{mode}");
        assert_eq!(runtime.path_cache_len(), 0, "{mode}");
        assert_eq!(runtime.capped_checkpoint_count(), 0, "{mode}");
        assert_eq!(runtime.last_checkpoint(), None, "{mode}");
    }
}
