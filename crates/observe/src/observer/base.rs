use super::{Observer, ObserverState};
use crate::error::ObserveError;
use crate::runtime::Runtime;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

pub(crate) enum Callback<C: ?Sized> {
    Typed(Box<C>),
    Forward(Box<dyn FnMut(&Value)>),
}

/// Lifecycle state and callback dispatch shared by all observers.
pub(crate) struct ObserverBase<C: ?Sized> {
    id: u64,
    runtime: Runtime,
    me: Weak<dyn Observer>,
    state: Cell<ObserverState>,
    nested: Cell<bool>,
    reporting: Cell<bool>,
    callback: RefCell<Option<Callback<C>>>,
}

impl<C: ?Sized> ObserverBase<C> {
    pub(crate) fn new(runtime: &Runtime, me: Weak<dyn Observer>) -> Self {
        Self {
            id: runtime.next_observer_id(),
            runtime: runtime.clone(),
            me,
            state: Cell::new(ObserverState::Unopened),
            nested: Cell::new(false),
            reporting: Cell::new(false),
            callback: RefCell::new(None),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub(crate) fn me(&self) -> &Weak<dyn Observer> {
        &self.me
    }

    pub(crate) fn handle(&self) -> Option<Rc<dyn Observer>> {
        self.me.upgrade()
    }

    pub(crate) fn state(&self) -> ObserverState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: ObserverState) {
        self.state.set(state);
    }

    pub(crate) fn is_opened(&self) -> bool {
        self.state.get() == ObserverState::Opened
    }

    /// Whether an explicit `deliver` may check now. While the observer's own
    /// callback runs it may not: the change stays unseen and the next check
    /// after the callback returns reports it.
    pub(crate) fn can_deliver(&self) -> bool {
        self.is_opened() && !self.reporting.get()
    }

    /// Installs the callback. The caller connects and then calls
    /// [`finish_open`](Self::finish_open).
    pub(crate) fn begin_open(&self, callback: Callback<C>, nested: bool) -> Result<(), ObserveError> {
        if self.state.get() != ObserverState::Unopened {
            return Err(ObserveError::AlreadyOpened);
        }
        *self.callback.borrow_mut() = Some(callback);
        self.nested.set(nested);
        Ok(())
    }

    pub(crate) fn finish_open(&self) {
        self.state.set(ObserverState::Opened);
        self.runtime.observer_opened(self.handle(), self.nested.get());
    }

    /// Moves to `Closed`. Returns `false` when there was nothing to close.
    pub(crate) fn begin_close(&self) -> bool {
        match self.state.get() {
            ObserverState::Opened | ObserverState::Resetting => {}
            ObserverState::Unopened | ObserverState::Closed => return false,
        }
        self.state.set(ObserverState::Closed);
        self.callback.borrow_mut().take();
        self.runtime.observer_closed(self.id);
        true
    }

    /// Runs the callback with panics contained. Forwarding callbacks get
    /// `forwarded`; typed ones go through `invoke`.
    ///
    /// The callback is out of its slot while it runs. Observers refuse to
    /// `deliver` meanwhile (see [`can_deliver`](Self::can_deliver)), so
    /// nothing reaches this point re-entrantly with a fresh change.
    pub(crate) fn report(&self, forwarded: &Value, invoke: impl FnOnce(&mut C)) {
        let Some(mut callback) = self.callback.borrow_mut().take() else {
            return;
        };
        self.reporting.set(true);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &mut callback {
            Callback::Typed(typed) => invoke(&mut **typed),
            Callback::Forward(notify) => notify(forwarded),
        }));
        self.reporting.set(false);
        if let Err(payload) = outcome {
            self.runtime.record_fault(self.id, payload);
        }
        if self.state.get() != ObserverState::Closed {
            let mut slot = self.callback.borrow_mut();
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }
}
