//! How one checkpoint cycle discovers changes.
//!
//! The strategy is picked once, from [`ObserveConfig`](crate::config::ObserveConfig),
//! when a [`Runtime`] is built.

use crate::config::ChangeSourceKind;
use crate::runtime::Runtime;

pub trait ChangeSource {
    fn kind(&self) -> ChangeSourceKind;

    /// Whether opened top-level observers are collected for sweeping.
    fn collects_observers(&self) -> bool;

    /// Runs one cycle; returns whether anything changed.
    fn run_cycle(&self, runtime: &Runtime) -> bool;
}

/// Re-evaluates every collected observer, in registration order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirtyChecking;

impl ChangeSource for DirtyChecking {
    fn kind(&self) -> ChangeSourceKind {
        ChangeSourceKind::DirtyChecking
    }

    fn collects_observers(&self) -> bool {
        true
    }

    fn run_cycle(&self, runtime: &Runtime) -> bool {
        runtime.sweep_observers()
    }
}

/// Delivers the change records queued on native watches.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeNotification;

impl ChangeSource for NativeNotification {
    fn kind(&self) -> ChangeSourceKind {
        ChangeSourceKind::NativeNotification
    }

    fn collects_observers(&self) -> bool {
        false
    }

    fn run_cycle(&self, runtime: &Runtime) -> bool {
        runtime.flush_deliveries()
    }
}

pub fn change_source(kind: ChangeSourceKind) -> Box<dyn ChangeSource> {
    match kind {
        ChangeSourceKind::DirtyChecking => Box::new(DirtyChecking),
        ChangeSourceKind::NativeNotification => Box::new(NativeNotification),
    }
}
