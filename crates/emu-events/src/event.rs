use serde::{Deserialize, Serialize};

use crate::error::{EventError, Result};
use crate::periodic::PeriodicHandle;

/// Closed set of event kinds known to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    FrameStart = 0,
    FrameEnd = 1,
    VBlank = 2,
    HBlank = 3,
    CpuStep = 4,
    Pause = 5,
    Resume = 6,
    Reset = 7,
    /// Controller/keyboard state changed.
    InputChanged = 8,
    /// The audio mixer filled a buffer and wants it drained.
    AudioBufferReady = 9,
    SaveState = 10,
    LoadState = 11,
}

impl EventKind {
    pub const COUNT: usize = 12;

    pub const ALL: [EventKind; Self::COUNT] = [
        EventKind::FrameStart,
        EventKind::FrameEnd,
        EventKind::VBlank,
        EventKind::HBlank,
        EventKind::CpuStep,
        EventKind::Pause,
        EventKind::Resume,
        EventKind::Reset,
        EventKind::InputChanged,
        EventKind::AudioBufferReady,
        EventKind::SaveState,
        EventKind::LoadState,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u32> for EventKind {
    type Error = EventError;

    fn try_from(raw: u32) -> Result<Self> {
        Self::ALL
            .get(raw as usize)
            .copied()
            .ok_or(EventError::InvalidArgument("event kind out of range"))
    }
}

/// Delivery precedence. Higher variants are delivered first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Critical,
    ];
}

impl TryFrom<u32> for Priority {
    type Error = EventError;

    fn try_from(raw: u32) -> Result<Self> {
        Self::ALL
            .get(raw as usize)
            .copied()
            .ok_or(EventError::InvalidArgument("priority out of range"))
    }
}

/// Payload carried by a queued event.
///
/// One-shot events own their bytes; the buffer is dropped together with the queue slot once the
/// event has been delivered or purged. Instances materialized from a periodic registration only
/// name the registration: the registration table owns the bytes and outlives every instance
/// that refers to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Payload {
    #[default]
    None,
    Owned(Box<[u8]>),
    Periodic(PeriodicHandle),
}

impl Payload {
    /// Copies `bytes` into an owned payload. Empty or absent input yields [`Payload::None`].
    pub fn copied_from(bytes: Option<&[u8]>) -> Self {
        match bytes {
            Some(bytes) if !bytes.is_empty() => Payload::Owned(bytes.into()),
            _ => Payload::None,
        }
    }

    pub fn periodic_handle(&self) -> Option<PeriodicHandle> {
        match self {
            Payload::Periodic(handle) => Some(*handle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Virtual time at which the event was emitted.
    pub timestamp: u64,
    pub payload: Payload,
}

impl Event {
    pub fn new(kind: EventKind, timestamp: u64) -> Self {
        Self {
            kind,
            timestamp,
            payload: Payload::None,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Bytes of an owned payload. Periodic payloads live in the dispatcher and are resolved
    /// there before delivery.
    pub fn owned_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Owned(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// What a callback sees when an event is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventView<'a> {
    pub kind: EventKind,
    pub timestamp: u64,
    pub payload: Option<&'a [u8]>,
}
