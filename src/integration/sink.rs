//! Destinations for lifecycle events.

use std::collections::VecDeque;

use crate::tracker::DepositEvent;

/// Receives every event the tracker emits, in emission order.
pub trait EventSink {
    fn publish(&mut self, event: &DepositEvent);
}

impl EventSink for Vec<DepositEvent> {
    fn publish(&mut self, event: &DepositEvent) {
        self.push(event.clone());
    }
}

/// Bounded feed of the most recent events. Older events fall off the front.
#[derive(Debug, Clone)]
pub struct EventFeed {
    events: VecDeque<DepositEvent>,
    capacity: usize,
}

impl EventFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Events oldest first.
    pub fn recent(&self) -> Vec<DepositEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new(50)
    }
}

impl EventSink for EventFeed {
    fn publish(&mut self, event: &DepositEvent) {
        if self.capacity == 0 {
            return;
        }
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());
    }
}
