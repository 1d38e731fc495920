use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EventError>;

/// Fixed-size table that rejected an insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Queue,
    PeriodicSlots,
    Callbacks,
    /// The 32-bit handle space of a registry has been used up.
    Handles,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Queue => "event queue",
            Resource::PeriodicSlots => "periodic slot pool",
            Resource::Callbacks => "callback list",
            Resource::Handles => "handle space",
        };
        f.write_str(name)
    }
}

/// Errors returned by the event queue and dispatcher.
///
/// Every variant is recoverable: a failed call leaves the queue, the periodic table and the
/// callback lists exactly as they were before the call. "Nothing is ready" is not an error and
/// is reported as `None` by [`crate::PriorityHeap::pop`] and [`crate::PriorityHeap::peek`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("{resource} is full (capacity={capacity})")]
    CapacityExceeded { resource: Resource, capacity: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: u32 },
}
