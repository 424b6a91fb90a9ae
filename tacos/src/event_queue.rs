use std::collections::BTreeSet;

use crate::Time;

/// Ordered, deduplicated set of future event times.
///
/// Scheduling the same time twice collapses to one event, so pops are
/// strictly ascending.
#[derive(Debug, Default, Clone)]
pub struct EventQueue {
    current_time: Time,
    queue: BTreeSet<Time>,
}

impl EventQueue {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline]
    pub fn current_time(&self) -> Time {
        self.current_time
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn schedule(&mut self, event_time: Time) {
        assert!(
            event_time > self.current_time,
            "event at {} ps scheduled in the past ({} ps)",
            event_time,
            self.current_time
        );
        self.queue.insert(event_time);
    }

    /// Removes and returns the earliest event time, advancing the clock.
    pub fn pop(&mut self) -> Time {
        let event_time = *self.queue.iter().next().expect("event queue is empty");
        self.queue.remove(&event_time);
        self.current_time = event_time;
        event_time
    }
}
