//! Host wall-clock sources.
//!
//! Scheduling never reads a host clock: virtual time is always handed to
//! [`crate::Dispatcher::process`] by the caller. The host clock is only used to measure how long a
//! batch of callbacks took, which feeds the processing-time statistic.

use std::cell::Cell;
use std::rc::Rc;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

pub trait HostClock {
    /// Monotonic host time in nanoseconds since an arbitrary origin.
    fn now_ns(&self) -> u64;
}

impl<T: HostClock + ?Sized> HostClock for Rc<T> {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
}

impl<T: HostClock + ?Sized> HostClock for &T {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StdHostClock {
    origin: Instant,
}

impl StdHostClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdHostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for StdHostClock {
    fn now_ns(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug, Default)]
pub struct FakeHostClock {
    now_ns: Cell<u64>,
}

impl FakeHostClock {
    pub fn new(now_ns: u64) -> Self {
        Self {
            now_ns: Cell::new(now_ns),
        }
    }

    pub fn advance(&self, ns: u64) {
        self.now_ns.set(self.now_ns.get().saturating_add(ns));
    }

    pub fn set_now_ns(&self, now_ns: u64) {
        self.now_ns.set(now_ns);
    }
}

impl HostClock for FakeHostClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.get()
    }
}
