//! Native change notification plumbing.
//!
//! A [`Watch`] is installed on any number of objects. Objects only keep weak
//! references to their watches; every mutation appends a record to each live
//! watch and queues that watch once on its runtime's [`DeliveryQueue`].
//! Flushing the queue hands each watch its pending records in emission
//! order.

use crate::record::ChangeRecord;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

type Handler = Box<dyn FnMut(Vec<ChangeRecord>)>;

pub(crate) struct Watch {
    me: Weak<Watch>,
    queue: Weak<DeliveryQueue>,
    pending: RefCell<Vec<ChangeRecord>>,
    queued: Cell<bool>,
    handler: RefCell<Option<Handler>>,
}

impl Watch {
    pub(crate) fn new(
        queue: &Rc<DeliveryQueue>,
        handler: impl FnMut(Vec<ChangeRecord>) + 'static,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            queue: Rc::downgrade(queue),
            pending: RefCell::new(Vec::new()),
            queued: Cell::new(false),
            handler: RefCell::new(Some(Box::new(handler))),
        })
    }

    pub(crate) fn enqueue(&self, record: ChangeRecord) {
        self.pending.borrow_mut().push(record);
        self.schedule();
    }

    fn schedule(&self) {
        if self.queued.get() {
            return;
        }
        if let (Some(queue), Some(me)) = (self.queue.upgrade(), self.me.upgrade()) {
            self.queued.set(true);
            queue.push(me);
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    /// Hands all pending records to the handler now.
    pub(crate) fn deliver(&self) {
        if !self.has_pending() {
            return;
        }
        // Already inside the handler; the outer call picks the records up.
        let Some(mut handler) = self.handler.borrow_mut().take() else {
            return;
        };
        let records = std::mem::take(&mut *self.pending.borrow_mut());
        handler(records);
        *self.handler.borrow_mut() = Some(handler);

        if self.has_pending() {
            self.schedule();
        }
    }

    pub(crate) fn discard(&self) {
        self.pending.borrow_mut().clear();
    }

    /// Installs this watch on `value`. Primitives are ignored.
    pub(crate) fn observe(&self, value: &Value) {
        if let Some(watchers) = value.watchers() {
            watchers.add(&self.me);
        }
    }

    pub(crate) fn unobserve(&self, value: &Value) {
        if let Some(watchers) = value.watchers() {
            watchers.remove(&self.me);
        }
    }
}

/// Weak watch list carried by every object and array.
#[derive(Default)]
pub(crate) struct Watchers(RefCell<Vec<Weak<Watch>>>);

impl Watchers {
    fn add(&self, watch: &Weak<Watch>) {
        let mut list = self.0.borrow_mut();
        list.retain(|w| w.strong_count() > 0);
        if !list.iter().any(|w| w.ptr_eq(watch)) {
            list.push(watch.clone());
        }
    }

    fn remove(&self, watch: &Weak<Watch>) {
        self.0
            .borrow_mut()
            .retain(|w| w.strong_count() > 0 && !w.ptr_eq(watch));
    }

    pub(crate) fn len(&self) -> usize {
        self.0.borrow().iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Sends a record to every live watch. The record is only built when
    /// somebody is listening.
    pub(crate) fn notify(&self, record: impl FnOnce() -> ChangeRecord) {
        let live: Vec<Rc<Watch>> = self.0.borrow().iter().filter_map(Weak::upgrade).collect();
        let Some((last, rest)) = live.split_last() else {
            return;
        };
        let record = record();
        for watch in rest {
            watch.enqueue(record.clone());
        }
        last.enqueue(record);
    }
}

/// Watches with pending records, in the order they first became dirty.
#[derive(Default)]
pub(crate) struct DeliveryQueue {
    watches: RefCell<VecDeque<Rc<Watch>>>,
}

impl DeliveryQueue {
    fn push(&self, watch: Rc<Watch>) {
        self.watches.borrow_mut().push_back(watch);
    }

    pub(crate) fn len(&self) -> usize {
        self.watches.borrow().len()
    }

    pub(crate) fn clear(&self) {
        for watch in self.watches.borrow_mut().drain(..) {
            watch.queued.set(false);
        }
    }

    /// Delivers every watch queued so far. Watches queued by the handlers
    /// themselves wait for the next flush. Returns whether anything was
    /// delivered.
    pub(crate) fn flush(&self) -> bool {
        let batch: Vec<Rc<Watch>> = self.watches.borrow_mut().drain(..).collect();
        let mut delivered = false;
        for watch in batch {
            watch.queued.set(false);
            if watch.has_pending() {
                delivered = true;
                watch.deliver();
            }
        }
        delivered
    }
}
