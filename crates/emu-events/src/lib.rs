//! Deferred, priority-ordered event scheduling for a tick-driven emulator loop.
//!
//! The crate has two layers:
//!
//! - [`PriorityHeap`]: a fixed-capacity binary heap of events ordered by [`Priority`] and due
//!   time, with a virtual clock that decides which items are ready.
//! - [`Dispatcher`]: one-shot and periodic scheduling on top of the heap, per-kind callbacks,
//!   load-adaptive rebalancing, a per-tick delivery budget, and basic throughput statistics.
//!
//! All time values are virtual (milliseconds by convention) and are supplied by the host on every
//! [`Dispatcher::process`] call, so a run is fully reproducible from its sequence of inputs. The
//! dispatcher is single-threaded; callbacks run inline and to completion.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use emu_events::{Dispatcher, DispatcherConfig, EventKind, Priority};
//!
//! let mut dispatcher = Dispatcher::new(DispatcherConfig::default()).unwrap();
//! let frames = Rc::new(Cell::new(0));
//! let counter = Rc::clone(&frames);
//! dispatcher
//!     .register_callback(EventKind::VBlank, move |_| counter.set(counter.get() + 1))
//!     .unwrap();
//!
//! dispatcher
//!     .schedule_periodic(EventKind::VBlank, None, Priority::High, 16, 0)
//!     .unwrap();
//! for now in (16..=160).step_by(16) {
//!     dispatcher.process(now, 0);
//! }
//! assert_eq!(frames.get(), 10);
//! ```

#![forbid(unsafe_code)]

mod callbacks;
mod clock;
mod config;
mod dispatcher;
mod error;
mod event;
mod heap;
mod periodic;
mod stats;

pub use callbacks::CallbackHandle;
pub use clock::{FakeHostClock, HostClock, StdHostClock};
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use error::{EventError, Resource, Result};
pub use event::{Event, EventKind, EventView, Payload, Priority};
pub use heap::{LoadPolicy, PriorityCounts, PriorityHeap, ScheduledItem};
pub use periodic::PeriodicHandle;
pub use stats::{StatsSnapshot, STATS_WINDOW};

#[cfg(test)]
mod proptests;
