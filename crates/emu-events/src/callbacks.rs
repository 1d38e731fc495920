use std::num::NonZeroU32;

use crate::error::{EventError, Resource, Result};
use crate::event::{EventKind, EventView};

/// Identifies a callback registration. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackHandle(NonZeroU32);

impl CallbackHandle {
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// Handlers run inline from [`crate::Dispatcher::process`] and must not block.
type Handler = Box<dyn FnMut(&EventView<'_>)>;

struct CallbackEntry {
    handle: CallbackHandle,
    handler: Handler,
}

/// Per-kind handler lists.
///
/// Lists are kept in registration order and walked backwards, so the most recently registered
/// handler runs first.
pub(crate) struct CallbackRegistry {
    lists: Vec<Vec<CallbackEntry>>,
    max_per_kind: usize,
    next_id: u32,
}

impl CallbackRegistry {
    pub(crate) fn new(max_per_kind: usize) -> Self {
        Self {
            lists: std::iter::repeat_with(Vec::new)
                .take(EventKind::COUNT)
                .collect(),
            max_per_kind,
            next_id: 1,
        }
    }

    pub(crate) fn register<F>(&mut self, kind: EventKind, handler: F) -> Result<CallbackHandle>
    where
        F: FnMut(&EventView<'_>) + 'static,
    {
        let list = &mut self.lists[kind.index()];
        if list.len() >= self.max_per_kind {
            return Err(EventError::CapacityExceeded {
                resource: Resource::Callbacks,
                capacity: self.max_per_kind,
            });
        }
        let id = NonZeroU32::new(self.next_id).ok_or(EventError::CapacityExceeded {
            resource: Resource::Handles,
            capacity: u32::MAX as usize,
        })?;
        self.next_id = self.next_id.wrapping_add(1);

        let handle = CallbackHandle(id);
        list.push(CallbackEntry {
            handle,
            handler: Box::new(handler),
        });
        Ok(handle)
    }

    pub(crate) fn unregister(&mut self, kind: EventKind, handle: CallbackHandle) -> Result<()> {
        let list = &mut self.lists[kind.index()];
        let pos = list
            .iter()
            .position(|entry| entry.handle == handle)
            .ok_or(EventError::NotFound {
                what: "callback",
                id: handle.get(),
            })?;
        list.remove(pos);
        Ok(())
    }

    pub(crate) fn len(&self, kind: EventKind) -> usize {
        self.lists[kind.index()].len()
    }

    /// Runs every handler registered for `event.kind`. Returns how many ran.
    pub(crate) fn dispatch(&mut self, event: &EventView<'_>) -> usize {
        let list = &mut self.lists[event.kind.index()];
        for entry in list.iter_mut().rev() {
            (entry.handler)(event);
        }
        list.len()
    }
}
