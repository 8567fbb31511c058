//! Observers: stateful watchers that report when what they watch changes.
//!
//! Every observer follows the same lifecycle:
//!
//! ```text
//! Unopened --open--> Opened --close--> Closed
//!                    Opened --start_reset--> Resetting --finish_reset--> Opened
//! ```
//!
//! Only [`CompoundObserver`] can be reset. `open` succeeds once per
//! instance; closed observers cannot be reopened.

mod array;
mod base;
mod compound;
mod object;
mod path;
mod transform;

pub use array::ArrayObserver;
pub use compound::{CompoundChanges, CompoundObserver, Dependency};
pub use object::{ObjectChanges, ObjectObserver};
pub use path::PathObserver;
pub use transform::{ObserverTransform, TransformBuilder};

use crate::error::ObserveError;
use crate::path::Key;
use crate::record::ChangeRecord;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverState {
    Unopened,
    Opened,
    Closed,
    Resetting,
}

/// Type-erased observer interface.
///
/// The concrete types expose a typed `open`; this trait is what the runtime,
/// observed sets and composite observers work with.
pub trait Observer {
    /// Runtime-unique id.
    fn id(&self) -> u64;

    fn state(&self) -> ObserverState;

    /// Last reported value.
    fn value(&self) -> Value;

    /// Opens the observer as a dependency of another one. It is left out of
    /// the dirty-checking sweep; `notify` receives the observer's value
    /// every time it reports a change.
    fn open_forwarding(&self, notify: Box<dyn FnMut(&Value)>) -> Result<Value, ObserveError>;

    /// Closes an opened or resetting observer. Calling it again is a no-op.
    fn close(&self);

    /// Re-checks immediately, outside of any checkpoint.
    fn deliver(&self);

    /// Accepts the current value as seen without reporting it.
    fn discard_changes(&self) -> Value;

    /// Writes through to whatever the observer watches, if it can.
    fn set_value(&self, _value: Value) -> bool {
        false
    }

    /// Starts watching and takes the initial snapshot.
    fn connect(&self);

    /// Stops watching and releases the snapshot.
    fn disconnect(&self);

    /// Recomputes the observed value and reports it when it changed.
    /// `records` carries native change records when there are any; with
    /// `skip_changes` the snapshot is refreshed silently.
    fn check(&self, records: Option<&[ChangeRecord]>, skip_changes: bool) -> bool;

    /// Visits every object the observed value currently depends on.
    fn iterate_objects(&self, visit: &mut dyn FnMut(&Value, &Key));
}

impl std::fmt::Debug for dyn Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
