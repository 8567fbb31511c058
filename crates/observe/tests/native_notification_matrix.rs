mod common;

use common::{ints, json, log};
use observe::{
    ArrayObserver, ArrayRef, Key, ObjectObserver, ObjectRef, Observer, PathObserver, Runtime,
    Splice, Value,
};
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn path_observers_on_one_root_share_a_watch() {
    let runtime = Runtime::native();
    let root = ObjectRef::from_entries([("a", Value::from(1)), ("b", Value::from(2))]);
    let first = PathObserver::new(&runtime, root.clone(), "a");
    let second = PathObserver::new(&runtime, root.clone(), "b");
    let (first_calls, second_calls) = (log(), log());
    let (a, b) = (first_calls.clone(), second_calls.clone());
    first
        .open(move |new, old, _| a.borrow_mut().push((new.clone(), old.clone())))
        .unwrap();
    second
        .open(move |new, old, _| b.borrow_mut().push((new.clone(), old.clone())))
        .unwrap();

    assert_eq!(runtime.observed_set_count(), 1);
    assert_eq!(root.watch_count(), 1);

    root.set("a", Value::from(10));
    root.set("b", Value::from(20));
    runtime.perform_microtask_checkpoint();
    assert_eq!(*first_calls.borrow(), vec![(Value::from(10), Value::from(1))]);
    assert_eq!(*second_calls.borrow(), vec![(Value::from(20), Value::from(2))]);

    first.close();
    assert_eq!(runtime.observed_set_count(), 1);
    assert_eq!(root.watch_count(), 1);

    root.set("a", Value::from(11));
    root.set("b", Value::from(30));
    runtime.perform_microtask_checkpoint();
    assert_eq!(first_calls.borrow().len(), 1);
    assert_eq!(
        second_calls.borrow().last().cloned(),
        Some((Value::from(30), Value::from(20)))
    );

    second.close();
    assert_eq!(runtime.observed_set_count(), 0);
    assert_eq!(runtime.pooled_observed_set_count(), 1);
    assert_eq!(root.watch_count(), 0);
}

#[test]
fn pooled_set_is_reused_for_the_next_root() {
    let runtime = Runtime::native();
    let first_root = ObjectRef::from_entries([("x", Value::from(1))]);
    let observer = PathObserver::new(&runtime, first_root.clone(), "x");
    observer.open(|_, _, _| {}).unwrap();
    observer.close();
    assert_eq!(runtime.pooled_observed_set_count(), 1);

    let second_root = ObjectRef::from_entries([("x", Value::from(1))]);
    let calls = log();
    let sink = calls.clone();
    let observer = PathObserver::new(&runtime, second_root.clone(), "x");
    observer
        .open(move |new, _, _| sink.borrow_mut().push(new.clone()))
        .unwrap();
    assert_eq!(runtime.pooled_observed_set_count(), 0);
    assert_eq!(first_root.watch_count(), 0);

    first_root.set("x", Value::from(2));
    second_root.set("x", Value::from(3));
    runtime.perform_microtask_checkpoint();
    assert_eq!(*calls.borrow(), ints(&[3]));
}

#[test]
fn every_object_on_the_path_is_watched() {
    let runtime = Runtime::native();
    let model = json(json!({"a": {"b": {"c": 1}}}));
    let observer = PathObserver::new(&runtime, model.clone(), "a.b.c");
    observer.open(|_, _, _| {}).unwrap();

    let a = model.get_key(&Key::from("a"));
    let b = a.get_key(&Key::from("b"));
    for value in [&model, &a, &b] {
        assert_eq!(value.as_object().unwrap().watch_count(), 1);
    }
    observer.close();
    for value in [&model, &a, &b] {
        assert_eq!(value.as_object().unwrap().watch_count(), 0);
    }
}

#[test]
fn unread_root_properties_do_not_wake_observers() {
    let runtime = Runtime::native();
    let root = ObjectRef::from_entries([("watched", Value::from(1))]);
    let observer = PathObserver::new(&runtime, root.clone(), "watched");
    let fired = Rc::new(Cell::new(0));
    let count = fired.clone();
    observer.open(move |_, _, _| count.set(count.get() + 1)).unwrap();

    root.set("other", Value::from(1));
    root.set("other", Value::from(2));
    assert_eq!(runtime.pending_delivery_count(), 1);
    runtime.perform_microtask_checkpoint();
    assert_eq!(runtime.pending_delivery_count(), 0);
    assert_eq!(fired.get(), 0);

    root.set("watched", Value::from(2));
    runtime.perform_microtask_checkpoint();
    assert_eq!(fired.get(), 1);
}

#[test]
fn object_observer_diffs_native_records() {
    let runtime = Runtime::native();
    let object = ObjectRef::from_entries([("a", Value::from(1)), ("c", Value::from(3))]);
    let observer = ObjectObserver::new(&runtime, object.clone());
    let calls = log();
    let sink = calls.clone();
    observer
        .open(move |changes| sink.borrow_mut().push(changes.clone()))
        .unwrap();
    assert_eq!(object.watch_count(), 1);

    object.set("a", Value::from(2));
    object.set("b", Value::from(5));
    object.delete("c");
    object.set("tmp", Value::Null);
    object.delete("tmp");
    runtime.perform_microtask_checkpoint();

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    let changes = &calls[0];
    assert_eq!(changes.added.get("b"), Some(&Value::from(5)));
    assert_eq!(changes.added.len(), 1);
    assert_eq!(changes.removed, vec!["c".to_string()]);
    assert_eq!(changes.changed.get("a"), Some(&Value::from(2)));
    assert_eq!(changes.old_value("a"), Value::from(1));
    assert_eq!(changes.old_value("c"), Value::from(3));
    assert_eq!(changes.old_value("tmp"), Value::Undefined);
    drop(calls);

    observer.close();
    assert_eq!(object.watch_count(), 0);
}

#[test]
fn update_back_to_original_value_reports_nothing() {
    let runtime = Runtime::native();
    let object = ObjectRef::from_entries([("a", Value::from(1))]);
    let observer = ObjectObserver::new(&runtime, object.clone());
    let fired = Rc::new(Cell::new(0));
    let count = fired.clone();
    observer.open(move |_| count.set(count.get() + 1)).unwrap();

    object.set("a", Value::from(2));
    object.set("a", Value::from(1));
    runtime.perform_microtask_checkpoint();
    assert_eq!(fired.get(), 0);
}

#[test]
fn array_observer_projects_incremental_records() {
    let runtime = Runtime::native();
    let array = ArrayRef::from_vec(ints(&[1, 2]));
    let observer = ArrayObserver::new(&runtime, array.clone()).unwrap();
    let calls = log();
    let sink = calls.clone();
    observer
        .open(move |splices| sink.borrow_mut().push(splices.to_vec()))
        .unwrap();

    array.push(Value::from(3));
    array.set(0, Value::from(9));
    runtime.perform_microtask_checkpoint();

    assert_eq!(
        *calls.borrow(),
        vec![vec![
            Splice::new(0, ints(&[1]), 1),
            Splice::new(2, vec![], 1)
        ]]
    );
}

#[test]
fn push_then_pop_cancels_out() {
    let runtime = Runtime::native();
    let array = ArrayRef::from_vec(ints(&[1, 2, 3]));
    let observer = ArrayObserver::new(&runtime, array.clone()).unwrap();
    let fired = Rc::new(Cell::new(0));
    let count = fired.clone();
    observer.open(move |_| count.set(count.get() + 1)).unwrap();

    array.push(Value::from(4));
    array.pop();
    runtime.perform_microtask_checkpoint();
    assert_eq!(fired.get(), 0);
}

#[test]
fn callback_writes_settle_within_one_checkpoint() {
    let runtime = Runtime::native();
    let object = ObjectRef::from_entries([("source", Value::from(1)), ("mirror", Value::from(1))]);
    let source = PathObserver::new(&runtime, object.clone(), "source");
    let mirror = PathObserver::new(&runtime, object.clone(), "mirror");
    let target = object.clone();
    source
        .open(move |new, _, _| target.set("mirror", new.clone()))
        .unwrap();
    let calls = log();
    let sink = calls.clone();
    mirror
        .open(move |new, _, _| sink.borrow_mut().push(new.clone()))
        .unwrap();

    object.set("source", Value::from(7));
    let report = runtime.perform_microtask_checkpoint();
    assert_eq!(*calls.borrow(), ints(&[7]));
    assert!(report.changed);
    assert!(!report.capped);
    assert_eq!(mirror.value(), Value::from(7));
}
