use serde::{Deserialize, Serialize};

use crate::error::{EventError, Result};
use crate::heap::LoadPolicy;

/// Construction-time limits of a [`crate::Dispatcher`].
///
/// Every table is fixed-size; exceeding a limit is reported as
/// [`EventError::CapacityExceeded`] and never grows the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub queue_capacity: usize,
    pub periodic_slots: usize,
    /// Upper bound on deliveries per `process` call.
    pub max_events_per_tick: usize,
    pub max_callbacks_per_kind: usize,
    pub load_policy: LoadPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            periodic_slots: 64,
            max_events_per_tick: 100,
            max_callbacks_per_kind: 32,
            load_policy: LoadPolicy::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(EventError::InvalidConfig("queue_capacity must be > 0"));
        }
        if self.periodic_slots == 0 {
            return Err(EventError::InvalidConfig("periodic_slots must be > 0"));
        }
        if self.max_events_per_tick == 0 {
            return Err(EventError::InvalidConfig("max_events_per_tick must be > 0"));
        }
        if self.max_callbacks_per_kind == 0 {
            return Err(EventError::InvalidConfig(
                "max_callbacks_per_kind must be > 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.load_policy.high_water) {
            return Err(EventError::InvalidConfig(
                "load_policy.high_water must be within 0.0..=1.0",
            ));
        }
        Ok(())
    }
}
