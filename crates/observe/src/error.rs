//! Lifecycle errors returned by observers.

use thiserror::Error;

/// Misuse of an observer's lifecycle. These are caller bugs and are
/// returned synchronously from the offending call.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ObserveError {
    #[error("observer has already been opened")]
    AlreadyOpened,
    #[error("cannot add dependencies once started")]
    DependenciesLocked,
    #[error("can only reset while open")]
    NotOpen,
    #[error("can only finish a reset after starting one")]
    NotResetting,
    #[error("provided value is not an array")]
    NotAnArray,
}
