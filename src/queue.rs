use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::event::LogEvent;

/// Unbounded FIFO between producers and the flush loop.
///
/// Producers only take the inner lock for the duration of a push; the gate
/// that serializes delivery lives in the flusher, so enqueueing never waits
/// on network I/O. The queue has no upper bound, under a sustained backend
/// outage it grows until the outage ends.
#[derive(Default)]
pub(crate) struct EventQueue {
    events: Mutex<VecDeque<LogEvent>>,
}

impl EventQueue {
    pub fn push(&self, event: LogEvent) {
        self.events.lock().push_back(event);
    }

    /// Append a failed batch at the tail for a later cycle. Requeued events
    /// are new items, re-delivery may reorder across batches.
    pub fn requeue(&self, batch: Vec<LogEvent>) {
        self.events.lock().extend(batch);
    }

    /// Pop up to `max` events in arrival order, safe under concurrent pushes.
    pub fn pop_batch(&self, max: usize) -> Vec<LogEvent> {
        let mut events = self.events.lock();
        let count = max.min(events.len());
        events.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
