//! Fixed-capacity binary heap of scheduled events.
//!
//! Items are ordered by priority (higher first) and then by absolute due time (earlier first).
//! The heap also tracks a virtual "now": an item is *ready* once its due time has been reached
//! and it has not been canceled. Only ready items are ever returned by [`PriorityHeap::pop`].
//!
//! Canceled items keep their slot until [`PriorityHeap::purge`] compacts them away; they still
//! take part in the heap order, which keeps cancellation O(n) without any re-heapify.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{EventError, Resource, Result};
use crate::event::{Event, EventKind, Payload, Priority};

/// How the heap reacts to a high system load in [`PriorityHeap::adapt_priorities`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadPolicy {
    /// Load (0.0 - 1.0) above which LOW items are postponed and CRITICAL items made due.
    pub high_water: f32,
    /// Virtual time added to every LOW item's due time per adaptation pass.
    pub low_priority_backoff: u64,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            high_water: 0.8,
            low_priority_backoff: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledItem {
    event: Event,
    priority: Priority,
    due: u64,
    canceled: bool,
}

impl ScheduledItem {
    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_event(self) -> Event {
        self.event
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Absolute virtual time at which the item becomes deliverable.
    pub fn due(&self) -> u64 {
        self.due
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    #[inline]
    pub fn is_ready(&self, now: u64) -> bool {
        !self.canceled && self.due <= now
    }

    /// `Greater` means `self` should be delivered before `other`.
    #[inline]
    fn rank(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.due.cmp(&self.due))
    }

    #[inline]
    fn outranks(&self, other: &Self) -> bool {
        self.rank(other) == Ordering::Greater
    }
}

/// Number of live (non-canceled) items per priority class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub low: usize,
    pub normal: usize,
    pub high: usize,
    pub critical: usize,
}

impl PriorityCounts {
    pub fn total(&self) -> usize {
        self.low + self.normal + self.high + self.critical
    }
}

#[derive(Debug)]
pub struct PriorityHeap {
    items: Vec<ScheduledItem>,
    capacity: usize,
    now: u64,
    policy: LoadPolicy,
}

impl PriorityHeap {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(EventError::InvalidConfig("queue capacity must be > 0"));
        }
        let mut items = Vec::new();
        items
            .try_reserve_exact(capacity)
            .map_err(|_| EventError::InvalidConfig("queue capacity cannot be allocated"))?;
        Ok(Self {
            items,
            capacity,
            now: 0,
            policy: LoadPolicy::default(),
        })
    }

    pub fn with_load_policy(mut self, policy: LoadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn load_policy(&self) -> LoadPolicy {
        self.policy
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots, canceled items included.
    pub fn occupancy(&self) -> usize {
        self.items.len()
    }

    /// Number of items that have not been canceled.
    pub fn size(&self) -> usize {
        self.items.iter().filter(|item| !item.canceled).count()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Moves the virtual clock. Nothing is delivered as a side effect.
    pub fn update(&mut self, now: u64) {
        self.now = now;
    }

    /// Slots in array order, canceled items included.
    pub fn iter(&self) -> impl Iterator<Item = &ScheduledItem> {
        self.items.iter()
    }

    /// Queues `event` to become ready `delay` time units from now.
    ///
    /// The heap takes ownership of the event and its payload. A full heap rejects the event and
    /// is left untouched.
    pub fn push(&mut self, event: Event, priority: Priority, delay: u64) -> Result<()> {
        if self.is_full() {
            return Err(EventError::CapacityExceeded {
                resource: Resource::Queue,
                capacity: self.capacity,
            });
        }

        self.items.push(ScheduledItem {
            event,
            priority,
            due: self.now.saturating_add(delay),
            canceled: false,
        });
        let last = self.items.len() - 1;
        self.sift_up(last);
        Ok(())
    }

    /// Removes and returns the highest-ranked ready item, if any.
    pub fn pop(&mut self) -> Option<Event> {
        self.pop_item().map(ScheduledItem::into_event)
    }

    /// Like [`PriorityHeap::pop`] but keeps the scheduling metadata.
    pub fn pop_item(&mut self) -> Option<ScheduledItem> {
        let index = self.next_ready_index()?;
        Some(self.remove_at(index))
    }

    /// The item [`PriorityHeap::pop`] would return, without removing it.
    pub fn peek(&self) -> Option<&ScheduledItem> {
        self.next_ready_index().map(|index| &self.items[index])
    }

    /// Marks every live item of `kind` as canceled.
    ///
    /// With `payload`, only items carrying an equal payload are affected: owned payloads compare
    /// by bytes, periodic instances by registration handle. Returns whether anything changed.
    pub fn cancel(&mut self, kind: EventKind, payload: Option<&Payload>) -> bool {
        let mut canceled = false;
        for item in self.items.iter_mut() {
            if item.canceled || item.event.kind != kind {
                continue;
            }
            if payload.is_some_and(|payload| *payload != item.event.payload) {
                continue;
            }
            item.canceled = true;
            canceled = true;
        }
        canceled
    }

    /// Rebalances due times for the given system load (clamped to 0.0 - 1.0).
    ///
    /// Above the policy's high-water mark every LOW item is postponed by the backoff and every
    /// CRITICAL item is made due no later than now. Returns whether an adaptation happened.
    pub fn adapt_priorities(&mut self, load: f32) -> bool {
        let load = if load.is_nan() {
            0.0
        } else {
            load.clamp(0.0, 1.0)
        };
        if load <= self.policy.high_water {
            return false;
        }

        let now = self.now;
        let backoff = self.policy.low_priority_backoff;
        for item in self.items.iter_mut() {
            match item.priority {
                Priority::Low => item.due = item.due.saturating_add(backoff),
                Priority::Critical => item.due = item.due.min(now),
                Priority::Normal | Priority::High => {}
            }
        }
        self.rebuild();
        true
    }

    /// Drops every canceled item and restores heap order. Returns the number removed.
    pub fn purge(&mut self) -> usize {
        self.purge_with(|_| {})
    }

    /// [`PriorityHeap::purge`], handing each removed item to `on_removed` before it is dropped.
    pub fn purge_with(&mut self, mut on_removed: impl FnMut(ScheduledItem)) -> usize {
        let before = self.items.len();
        let (kept, removed): (Vec<_>, Vec<_>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|item| !item.canceled);
        self.items = kept;
        self.items.reserve_exact(self.capacity - self.items.len());
        self.rebuild();
        for item in removed {
            on_removed(item);
        }
        before - self.items.len()
    }

    /// Drops every queued item, canceled or not.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn priority_counts(&self) -> PriorityCounts {
        let mut counts = PriorityCounts::default();
        for item in self.items.iter().filter(|item| !item.canceled) {
            match item.priority {
                Priority::Low => counts.low += 1,
                Priority::Normal => counts.normal += 1,
                Priority::High => counts.high += 1,
                Priority::Critical => counts.critical += 1,
            }
        }
        counts
    }

    /// Checks that no child outranks its parent.
    pub fn is_heap_ordered(&self) -> bool {
        (1..self.items.len()).all(|i| !self.items[i].outranks(&self.items[(i - 1) / 2]))
    }

    fn next_ready_index(&self) -> Option<usize> {
        let now = self.now;
        let root = self.items.first()?;
        // The root outranks every other slot, so a ready root is also the best ready item.
        if root.is_ready(now) {
            return Some(0);
        }

        let mut best: Option<usize> = None;
        for (i, item) in self.items.iter().enumerate().skip(1) {
            if !item.is_ready(now) {
                continue;
            }
            match best {
                Some(b) if !item.outranks(&self.items[b]) => {}
                _ => best = Some(i),
            }
        }
        best
    }

    fn remove_at(&mut self, index: usize) -> ScheduledItem {
        let removed = self.items.swap_remove(index);
        if index < self.items.len() {
            let settled = self.sift_up(index);
            if settled == index {
                self.sift_down(index);
            }
        }
        removed
    }

    fn sift_up(&mut self, mut index: usize) -> usize {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !self.items[index].outranks(&self.items[parent]) {
                break;
            }
            self.items.swap(index, parent);
            index = parent;
        }
        index
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut best = index;

            if left < len && self.items[left].outranks(&self.items[best]) {
                best = left;
            }
            if right < len && self.items[right].outranks(&self.items[best]) {
                best = right;
            }
            if best == index {
                break;
            }
            self.items.swap(index, best);
            index = best;
        }
    }

    fn rebuild(&mut self) {
        for index in (0..self.items.len() / 2).rev() {
            self.sift_down(index);
        }
    }
}
