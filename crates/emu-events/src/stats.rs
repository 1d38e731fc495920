use std::time::Duration;

use serde::Serialize;

/// Length of the throughput window, in virtual time units (milliseconds).
pub const STATS_WINDOW: u64 = 1_000;

/// Running counters kept by the dispatcher.
#[derive(Debug, Clone, Default)]
pub(crate) struct DispatcherStats {
    events_processed: u64,
    total_processing_ns: u64,
    /// Number of `process` calls that ran (paused calls are not counted).
    samples: u64,
    window_start: u64,
    events_this_window: u64,
    events_per_second: u64,
}

impl DispatcherStats {
    pub(crate) fn new(now: u64) -> Self {
        Self {
            window_start: now,
            ..Self::default()
        }
    }

    /// Folds one processing batch into the counters. `now` is the virtual time of the batch.
    pub(crate) fn record_batch(&mut self, processed: usize, elapsed_ns: u64, now: u64) {
        let processed = processed as u64;
        self.events_processed = self.events_processed.saturating_add(processed);
        self.total_processing_ns = self.total_processing_ns.saturating_add(elapsed_ns);
        self.samples = self.samples.saturating_add(1);
        self.events_this_window = self.events_this_window.saturating_add(processed);

        if now.saturating_sub(self.window_start) >= STATS_WINDOW {
            self.events_per_second = self.events_this_window;
            self.events_this_window = 0;
            self.window_start = now;
        }
    }

    pub(crate) fn snapshot(&self, queue_depth: usize) -> StatsSnapshot {
        let avg_processing_time = match self.events_processed {
            0 => Duration::ZERO,
            n => Duration::from_nanos(self.total_processing_ns / n),
        };
        StatsSnapshot {
            queue_depth,
            events_per_second: self.events_per_second,
            avg_processing_time,
            events_processed: self.events_processed,
            batches: self.samples,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Live (non-canceled) items in the queue.
    pub queue_depth: usize,
    /// Deliveries counted over the last completed one-second window.
    pub events_per_second: u64,
    /// Host wall time per delivered event.
    pub avg_processing_time: Duration,
    pub events_processed: u64,
    pub batches: u64,
}
