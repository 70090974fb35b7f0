//! Thread-safe handle around a deposit tracker.

use std::sync::Arc;

use parking_lot::RwLock;

use super::sink::{EventFeed, EventSink};
use crate::tracker::{
    DepositEvent, DepositTracker, Detection, DogSample, TrackerConfig, TrackerError, TrackerStatus,
};

struct Shared {
    tracker: DepositTracker,
    feed: EventFeed,
}

/// Cloneable handle sharing one tracker between the frame loop and readers.
///
/// `update` holds the write lock for the whole frame, so `status` and
/// `recent_events` only ever see state between two complete frames.
#[derive(Clone)]
pub struct SharedTracker {
    inner: Arc<RwLock<Shared>>,
}

impl SharedTracker {
    pub fn new(config: TrackerConfig, feed_capacity: usize) -> Result<Self, TrackerError> {
        Ok(Self::from_tracker(DepositTracker::new(config)?, feed_capacity))
    }

    pub fn from_tracker(tracker: DepositTracker, feed_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Shared {
                tracker,
                feed: EventFeed::new(feed_capacity),
            })),
        }
    }

    /// Run one frame through the tracker and record its events in the feed.
    pub fn update(
        &self,
        timestamp: f64,
        detections: &[Detection],
        dog_samples: &[DogSample],
    ) -> Result<Vec<DepositEvent>, TrackerError> {
        let mut guard = self.inner.write();
        let shared = &mut *guard;
        let events = shared.tracker.update(timestamp, detections, dog_samples)?;
        for event in &events {
            shared.feed.publish(event);
        }
        Ok(events)
    }

    pub fn status(&self) -> TrackerStatus {
        self.inner.read().tracker.status()
    }

    /// Recent events, oldest first.
    pub fn recent_events(&self) -> Vec<DepositEvent> {
        self.inner.read().feed.recent()
    }

    /// Run `f` against the tracker under the read lock.
    pub fn with_tracker<R>(&self, f: impl FnOnce(&DepositTracker) -> R) -> R {
        f(&self.inner.read().tracker)
    }
}

impl Default for SharedTracker {
    fn default() -> Self {
        Self::from_tracker(DepositTracker::default(), EventFeed::default().capacity())
    }
}
