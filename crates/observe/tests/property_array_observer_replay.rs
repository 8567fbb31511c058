//! Whatever the change source, the splices an ArrayObserver reports bring
//! a stale copy of the array up to date.

use observe::{ArrayObserver, ArrayRef, Observer, Runtime, Value};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Mutation {
    Insert(usize, i32),
    Remove(usize),
    Set(usize, i32),
    Push(i32),
    Splice(usize, usize, Vec<i32>),
}

fn arb_mutation() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        (any::<usize>(), 0i32..4).prop_map(|(at, v)| Mutation::Insert(at, v)),
        any::<usize>().prop_map(Mutation::Remove),
        (any::<usize>(), 0i32..4).prop_map(|(at, v)| Mutation::Set(at, v)),
        (0i32..4).prop_map(Mutation::Push),
        (any::<usize>(), 0usize..3, proptest::collection::vec(0i32..4, 0..3))
            .prop_map(|(at, count, items)| Mutation::Splice(at, count, items)),
    ]
}

fn apply(array: &ArrayRef, mutation: &Mutation) {
    let len = array.len();
    match mutation {
        Mutation::Insert(at, v) => array.insert(at % (len + 1), Value::from(*v)),
        Mutation::Remove(at) if len > 0 => {
            array.remove(at % len);
        }
        Mutation::Set(at, v) if len > 0 => {
            array.set(at % len, Value::from(*v));
        }
        Mutation::Push(v) => array.push(Value::from(*v)),
        Mutation::Splice(at, count, items) => {
            array.splice(at % (len + 1), *count, items.iter().copied().map(Value::from));
        }
        Mutation::Remove(_) | Mutation::Set(..) => {}
    }
}

proptest! {
    #[test]
    fn reported_splices_sync_a_copy(
        initial in proptest::collection::vec(0i32..4, 0..8),
        batches in proptest::collection::vec(proptest::collection::vec(arb_mutation(), 0..6), 1..4),
    ) {
        for runtime in [Runtime::dirty_checking(), Runtime::native()] {
            let live = ArrayRef::from_vec(initial.iter().copied().map(Value::from).collect());
            let copy = ArrayRef::from_vec(live.to_vec());
            let observer = ArrayObserver::new(&runtime, live.clone()).unwrap();
            let (source, target) = (live.clone(), copy.clone());
            observer
                .open(move |splices| ArrayObserver::apply_splices(&target, &source.to_vec(), splices))
                .unwrap();

            for batch in &batches {
                for mutation in batch {
                    apply(&live, mutation);
                }
                runtime.perform_microtask_checkpoint();
                prop_assert!(
                    Value::Array(copy.clone()).deep_equals(&Value::Array(live.clone())),
                    "{:?}: copy {:?} live {:?}",
                    runtime.change_source_kind(),
                    Value::Array(copy.clone()).to_json(),
                    Value::Array(live.clone()).to_json()
                );
            }
            observer.close();
        }
    }
}
