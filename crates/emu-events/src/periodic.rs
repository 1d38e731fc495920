use std::num::NonZeroU32;

use tracing::debug;

use crate::error::{EventError, Resource, Result};
use crate::event::{EventKind, Priority};

/// Identifies a periodic registration. Never zero, never reused by the same dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodicHandle(NonZeroU32);

impl PeriodicHandle {
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Still materializing instances.
    Active,
    /// Fire count used up; waiting for the last queued instances to be retired.
    Draining,
}

#[derive(Debug)]
pub(crate) struct PeriodicRegistration {
    pub(crate) handle: PeriodicHandle,
    pub(crate) kind: EventKind,
    pub(crate) payload: Option<Box<[u8]>>,
    pub(crate) priority: Priority,
    pub(crate) interval: u64,
    pub(crate) next_trigger: u64,
    /// Fires left; 0 means unbounded.
    remaining: u32,
    /// Queued instances that still refer to this registration.
    in_flight: u32,
    state: State,
}

impl PeriodicRegistration {
    pub(crate) fn is_active(&self) -> bool {
        self.state == State::Active
    }

    /// Accounts for one queued instance and advances to the next trigger time.
    fn record_fire(&mut self) {
        self.in_flight += 1;
        self.next_trigger = self.next_trigger.saturating_add(self.interval);
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.state = State::Draining;
                debug!(handle = self.handle.get(), kind = ?self.kind, "periodic event exhausted");
            }
        }
    }
}

/// Parameters of a new registration.
#[derive(Debug)]
pub(crate) struct PeriodicSpec<'a> {
    pub(crate) kind: EventKind,
    pub(crate) payload: Option<&'a [u8]>,
    pub(crate) priority: Priority,
    pub(crate) interval: u64,
    pub(crate) count: u32,
}

/// Fixed pool of periodic registrations.
///
/// The table is the only owner of periodic payload bytes. Queued instances carry a
/// [`PeriodicHandle`] and resolve their bytes through [`PeriodicTable::payload`]; a slot is only
/// released once the registration can no longer fire and none of its instances is queued.
#[derive(Debug)]
pub(crate) struct PeriodicTable {
    slots: Vec<Option<PeriodicRegistration>>,
    next_id: u32,
}

impl PeriodicTable {
    pub(crate) fn new(slots: usize) -> Result<Self> {
        let mut table = Vec::new();
        table
            .try_reserve_exact(slots)
            .map_err(|_| EventError::InvalidConfig("periodic slot pool cannot be allocated"))?;
        table.resize_with(slots, || None);
        Ok(Self {
            slots: table,
            next_id: 1,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Registrations occupying a slot, draining ones included.
    pub(crate) fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub(crate) fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// Stores a new registration whose first instance has already been queued at `now +
    /// interval`. That instance counts as the first fire.
    pub(crate) fn insert(&mut self, spec: PeriodicSpec<'_>, now: u64) -> Result<PeriodicHandle> {
        let capacity = self.slots.len();
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(EventError::CapacityExceeded {
                resource: Resource::PeriodicSlots,
                capacity,
            })?;

        let id = NonZeroU32::new(self.next_id).ok_or(EventError::CapacityExceeded {
            resource: Resource::Handles,
            capacity: u32::MAX as usize,
        })?;
        // Wrapping to 0 poisons the counter so handles are never reissued.
        self.next_id = self.next_id.wrapping_add(1);

        let handle = PeriodicHandle(id);
        let mut registration = PeriodicRegistration {
            handle,
            kind: spec.kind,
            payload: spec
                .payload
                .filter(|bytes| !bytes.is_empty())
                .map(Box::from),
            priority: spec.priority,
            interval: spec.interval,
            next_trigger: now.saturating_add(spec.interval),
            remaining: spec.count,
            in_flight: 0,
            state: State::Active,
        };
        registration.record_fire();
        *slot = Some(registration);
        Ok(handle)
    }

    pub(crate) fn get(&self, handle: PeriodicHandle) -> Option<&PeriodicRegistration> {
        self.slots
            .iter()
            .flatten()
            .find(|registration| registration.handle == handle)
    }

    pub(crate) fn payload(&self, handle: PeriodicHandle) -> Option<&[u8]> {
        self.get(handle)?.payload.as_deref()
    }

    /// Removes a registration outright, dropping its payload.
    pub(crate) fn remove(&mut self, handle: PeriodicHandle) -> Option<PeriodicRegistration> {
        self.slots
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|r| r.handle == handle))
            .and_then(Option::take)
    }

    /// Active registrations whose next trigger time has been reached.
    pub(crate) fn due(&self, now: u64) -> Vec<PeriodicHandle> {
        self.slots
            .iter()
            .flatten()
            .filter(|registration| registration.is_active() && registration.next_trigger <= now)
            .map(|registration| registration.handle)
            .collect()
    }

    pub(crate) fn record_fire(&mut self, handle: PeriodicHandle) {
        if let Some(registration) = self.get_mut(handle) {
            registration.record_fire();
        }
    }

    /// Called when a queued instance has been delivered or purged.
    pub(crate) fn retire_instance(&mut self, handle: PeriodicHandle) {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|r| r.handle == handle))
        else {
            return;
        };
        let Some(registration) = slot.as_mut() else {
            return;
        };
        registration.in_flight = registration.in_flight.saturating_sub(1);
        if registration.state == State::Draining && registration.in_flight == 0 {
            debug!(handle = handle.get(), "periodic registration released");
            *slot = None;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    fn get_mut(&mut self, handle: PeriodicHandle) -> Option<&mut PeriodicRegistration> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|registration| registration.handle == handle)
    }
}
