//! Change observation for shared, mutable object graphs.
//!
//! Observers watch a value and report when it changes:
//!
//! - [`PathObserver`]: the value at a property path below a root object.
//! - [`ObjectObserver`]: property additions, removals and changes.
//! - [`ArrayObserver`]: array changes as minimal [`Splice`] lists.
//! - [`CompoundObserver`]: many paths and observers folded into one report.
//! - [`ObserverTransform`]: a mapped view of another observer.
//!
//! Changes are discovered at checkpoints ([`Runtime::perform_microtask_checkpoint`]),
//! either by dirty checking every open observer or by delivering change
//! records that objects emit when mutated. The strategy is chosen through
//! [`ObserveConfig`].
//!
//! ```
//! use observe::{ArrayObserver, Runtime, Splice, Value};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! for runtime in [Runtime::dirty_checking(), Runtime::native()] {
//!     let items = Value::from_json(&serde_json::json!([1, 2, 3, 4]));
//!     let observer = ArrayObserver::new(&runtime, items.clone()).unwrap();
//!
//!     let reported = Rc::new(RefCell::new(Vec::new()));
//!     let sink = reported.clone();
//!     observer.open(move |splices| sink.borrow_mut().extend_from_slice(splices)).unwrap();
//!
//!     let array = items.as_array().unwrap();
//!     array.splice(1, 2, [Value::from(5), Value::from(6)]);
//!     runtime.perform_microtask_checkpoint();
//!
//!     assert_eq!(
//!         *reported.borrow(),
//!         vec![Splice::new(1, vec![Value::from(2), Value::from(3)], 2)]
//!     );
//! }
//! ```

pub mod change_source;
pub mod config;
pub mod error;
pub mod observer;
pub mod path;
pub mod record;
pub mod runtime;
pub mod splice;
pub mod value;

mod observed_set;
mod watch;

pub use config::{ChangeSourceKind, ObserveConfig, MAX_DIRTY_CHECK_CYCLES};
pub use error::ObserveError;
pub use observer::{
    ArrayObserver, CompoundChanges, CompoundObserver, Dependency, ObjectChanges, ObjectObserver,
    Observer, ObserverState, ObserverTransform, PathObserver,
};
pub use path::{Key, Path, PathCache};
pub use record::{Change, ChangeRecord};
pub use runtime::{CheckpointReport, Runtime};
pub use splice::Splice;
pub use value::{same_value, ArrayRef, ObjectRef, Value, MAX_ARRAY_LENGTH};
