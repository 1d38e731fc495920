//! Time-driven event dispatcher.
//!
//! The host loop calls [`Dispatcher::process`] once per tick with the current virtual time. Each
//! call:
//!
//! 1. moves the dispatcher and queue clocks forward,
//! 2. queues one instance for every periodic registration whose trigger time has arrived,
//! 3. lets the queue rebalance for the reported system load,
//! 4. pops up to the per-tick budget of ready events and runs their callbacks inline.

use tracing::{debug, trace, warn};

use crate::callbacks::{CallbackHandle, CallbackRegistry};
use crate::clock::{HostClock, StdHostClock};
use crate::config::DispatcherConfig;
use crate::error::{EventError, Resource, Result};
use crate::event::{Event, EventKind, EventView, Payload, Priority};
use crate::heap::PriorityHeap;
use crate::periodic::{PeriodicHandle, PeriodicSpec, PeriodicTable};
use crate::stats::{DispatcherStats, StatsSnapshot};

pub struct Dispatcher<C: HostClock = StdHostClock> {
    queue: PriorityHeap,
    periodic: PeriodicTable,
    callbacks: CallbackRegistry,
    stats: DispatcherStats,
    clock: C,
    now: u64,
    paused: bool,
    system_load: f32,
    max_events_per_tick: usize,
}

impl Dispatcher<StdHostClock> {
    pub fn new(config: DispatcherConfig) -> Result<Self> {
        Self::with_clock(config, StdHostClock::new())
    }
}

impl<C: HostClock> Dispatcher<C> {
    pub fn with_clock(config: DispatcherConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let queue = PriorityHeap::new(config.queue_capacity)?.with_load_policy(config.load_policy);
        Ok(Self {
            queue,
            periodic: PeriodicTable::new(config.periodic_slots)?,
            callbacks: CallbackRegistry::new(config.max_callbacks_per_kind),
            stats: DispatcherStats::new(0),
            clock,
            now: 0,
            paused: false,
            system_load: 0.0,
            max_events_per_tick: config.max_events_per_tick,
        })
    }

    /// Current virtual time.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn queue(&self) -> &PriorityHeap {
        &self.queue
    }

    /// Periodic registrations holding a slot, including exhausted ones whose last instances are
    /// still queued.
    pub fn periodic_count(&self) -> usize {
        self.periodic.len()
    }

    pub fn periodic_capacity(&self) -> usize {
        self.periodic.capacity()
    }

    pub fn callback_count(&self, kind: EventKind) -> usize {
        self.callbacks.len(kind)
    }

    /// Queues a one-shot event `delay` time units after the current virtual time.
    ///
    /// The payload is copied; the caller keeps ownership of `payload`.
    pub fn schedule(
        &mut self,
        kind: EventKind,
        payload: Option<&[u8]>,
        priority: Priority,
        delay: u64,
    ) -> Result<()> {
        let event = Event::new(kind, self.now).with_payload(Payload::copied_from(payload));
        if let Err(err) = self.queue.push(event, priority, delay) {
            debug!(?kind, ?priority, delay, %err, "event rejected");
            return Err(err);
        }
        Ok(())
    }

    /// Registers an event that fires every `interval` time units, `count` times (0 = forever).
    ///
    /// The first instance is due one full interval from now. The payload is copied once and
    /// shared by every instance.
    pub fn schedule_periodic(
        &mut self,
        kind: EventKind,
        payload: Option<&[u8]>,
        priority: Priority,
        interval: u64,
        count: u32,
    ) -> Result<PeriodicHandle> {
        if interval == 0 {
            return Err(EventError::InvalidArgument("periodic interval must be > 0"));
        }
        // Check both tables up front so a rejection leaves neither of them modified.
        if !self.periodic.has_free_slot() {
            return Err(EventError::CapacityExceeded {
                resource: Resource::PeriodicSlots,
                capacity: self.periodic_capacity(),
            });
        }
        if self.queue.is_full() {
            return Err(EventError::CapacityExceeded {
                resource: Resource::Queue,
                capacity: self.queue.capacity(),
            });
        }

        let spec = PeriodicSpec {
            kind,
            payload,
            priority,
            interval,
            count,
        };
        let handle = self.periodic.insert(spec, self.now)?;
        let first = Event::new(kind, self.now).with_payload(Payload::Periodic(handle));
        if let Err(err) = self.queue.push(first, priority, interval) {
            self.periodic.remove(handle);
            return Err(err);
        }

        debug!(handle = handle.get(), ?kind, interval, count, "periodic event registered");
        Ok(handle)
    }

    /// Cancels every queued event of `kind`, periodic instances included.
    pub fn cancel(&mut self, kind: EventKind) -> bool {
        self.queue.cancel(kind, None)
    }

    /// Cancels queued one-shot events of `kind` whose payload equals `payload`.
    pub fn cancel_matching(&mut self, kind: EventKind, payload: &[u8]) -> bool {
        let payload = Payload::copied_from(Some(payload));
        self.queue.cancel(kind, Some(&payload))
    }

    /// Stops a periodic registration, releases its payload and cancels its queued instances.
    pub fn cancel_periodic(&mut self, handle: PeriodicHandle) -> Result<()> {
        let registration = self.periodic.remove(handle).ok_or(EventError::NotFound {
            what: "periodic registration",
            id: handle.get(),
        })?;
        self.queue
            .cancel(registration.kind, Some(&Payload::Periodic(handle)));
        debug!(handle = handle.get(), kind = ?registration.kind, "periodic event canceled");
        Ok(())
    }

    /// Adds a handler for `kind`. Handlers run inline from [`Dispatcher::process`] while the
    /// dispatcher is mutably borrowed, so they cannot call back into it; record follow-up work in
    /// captured state and schedule it once `process` returns.
    pub fn register_callback<F>(&mut self, kind: EventKind, handler: F) -> Result<CallbackHandle>
    where
        F: FnMut(&EventView<'_>) + 'static,
    {
        self.callbacks.register(kind, handler)
    }

    pub fn unregister_callback(&mut self, kind: EventKind, handle: CallbackHandle) -> Result<()> {
        self.callbacks.unregister(kind, handle)
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Sets the load figure (clamped to 0.0 - 1.0) used by the next `process` call.
    pub fn set_system_load(&mut self, load: f32) {
        self.system_load = if load.is_nan() {
            0.0
        } else {
            load.clamp(0.0, 1.0)
        };
    }

    pub fn system_load(&self) -> f32 {
        self.system_load
    }

    /// Sets the per-tick delivery budget. Zero is raised to one.
    pub fn set_max_events_per_tick(&mut self, max_events: usize) {
        self.max_events_per_tick = max_events.max(1);
    }

    pub fn max_events_per_tick(&self) -> usize {
        self.max_events_per_tick
    }

    /// Runs one tick at virtual time `now`, delivering at most `max_events` events (0 means the
    /// configured budget; larger values are capped by it). Returns the number delivered.
    ///
    /// While paused nothing happens, the clock included.
    pub fn process(&mut self, now: u64, max_events: usize) -> usize {
        if self.paused {
            return 0;
        }

        self.now = self.now.max(now);
        self.queue.update(self.now);
        self.materialize_periodic();
        self.queue.adapt_priorities(self.system_load);

        let budget = match max_events {
            0 => self.max_events_per_tick,
            n => n.min(self.max_events_per_tick),
        };

        let start_ns = self.clock.now_ns();
        let mut processed = 0;
        while processed < budget {
            let Some(event) = self.queue.pop() else {
                break;
            };
            self.deliver(event);
            processed += 1;
        }
        let elapsed_ns = self.clock.now_ns().saturating_sub(start_ns);

        self.stats.record_batch(processed, elapsed_ns, self.now);
        trace!(
            now = self.now,
            processed,
            queue_depth = self.queue.size(),
            elapsed_ns,
            "processed event batch"
        );
        processed
    }

    /// Drops canceled events from the queue. Returns how many were removed.
    pub fn purge(&mut self) -> usize {
        let periodic = &mut self.periodic;
        self.queue.purge_with(|item| {
            if let Some(handle) = item.event().payload.periodic_handle() {
                periodic.retire_instance(handle);
            }
        })
    }

    /// Drops every queued event and every periodic registration. Callbacks stay registered.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.periodic.clear();
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.queue.size())
    }

    fn materialize_periodic(&mut self) {
        for handle in self.periodic.due(self.now) {
            let Some(registration) = self.periodic.get(handle) else {
                continue;
            };
            let kind = registration.kind;
            let priority = registration.priority;
            let instance = Event::new(kind, self.now).with_payload(Payload::Periodic(handle));
            match self.queue.push(instance, priority, 0) {
                Ok(()) => self.periodic.record_fire(handle),
                Err(err) => {
                    // Not advanced: the registration retries on the next tick.
                    warn!(handle = handle.get(), ?kind, %err, "periodic event deferred");
                }
            }
        }
    }

    fn deliver(&mut self, event: Event) {
        let payload = match &event.payload {
            Payload::None => None,
            Payload::Owned(bytes) => Some(&bytes[..]),
            Payload::Periodic(handle) => self.periodic.payload(*handle),
        };
        let view = EventView {
            kind: event.kind,
            timestamp: event.timestamp,
            payload,
        };
        self.callbacks.dispatch(&view);

        // Owned payloads are dropped with `event`; periodic ones belong to the table.
        if let Payload::Periodic(handle) = event.payload {
            self.periodic.retire_instance(handle);
        }
    }
}
