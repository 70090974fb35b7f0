//! Deposit entities owned by the tracker.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::tracker::deposit_state::DepositState;
use crate::tracker::posture::DogId;
use crate::tracker::rect::Rect;

/// Global deposit ID counter. IDs are never reused within a process.
static DEPOSIT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_deposit_id() -> DepositId {
    DepositId(DEPOSIT_ID_COUNTER.fetch_add(1, Ordering::SeqCst) + 1)
}

/// Stable identifier of a confirmed deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DepositId(pub u64);

impl fmt::Display for DepositId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deposit#{}", self.0)
    }
}

/// A posture trigger waiting for a detection to confirm it.
///
/// Pending entries have no id and no geometry beyond the anchor.
#[derive(Debug, Clone)]
pub struct PendingDeposit {
    pub anchor: Point2<f32>,
    pub originating_dog_id: Option<DogId>,
    pub created_at: f64,
    /// Frame of the most recent posture trigger at this anchor
    pub last_triggered_frame: u64,
}

impl PendingDeposit {
    pub fn new(anchor: Point2<f32>, dog_id: DogId, timestamp: f64, frame_id: u64) -> Self {
        Self {
            anchor,
            originating_dog_id: Some(dog_id),
            created_at: timestamp,
            last_triggered_frame: frame_id,
        }
    }

    pub fn refresh(&mut self, frame_id: u64) {
        self.last_triggered_frame = frame_id;
    }

    pub fn frames_since_trigger(&self, frame_id: u64) -> u64 {
        frame_id.saturating_sub(self.last_triggered_frame)
    }
}

/// A confirmed deposit.
#[derive(Debug, Clone)]
pub struct Deposit {
    /// Unique deposit identifier
    pub id: DepositId,
    pub state: DepositState,
    /// Last matched detection box
    pub bbox: Rect,
    pub center: Point2<f32>,
    pub created_at: f64,
    pub last_seen_at: f64,
    /// Consecutive frames without a matching detection
    pub missing_frames: u32,
    /// Consecutive frames with a human nearby and no detection
    pub cleanup_candidate_frames: u32,
    pub originating_dog_id: Option<DogId>,
    pub cleaned_at: Option<f64>,
    /// Frame of the last transition to Cleaned; orders history eviction
    pub cleaned_frame: Option<u64>,
}

impl Deposit {
    /// Confirm a pending entry with the detection box that matched it.
    pub fn confirm(pending: &PendingDeposit, bbox: Rect, timestamp: f64) -> Self {
        Self {
            id: next_deposit_id(),
            state: DepositState::Active,
            bbox,
            center: bbox.center(),
            created_at: timestamp,
            last_seen_at: timestamp,
            missing_frames: 0,
            cleanup_candidate_frames: 0,
            originating_dog_id: pending.originating_dog_id,
            cleaned_at: None,
            cleaned_frame: None,
        }
    }

    /// Record a matched detection.
    pub fn update(&mut self, bbox: Rect, timestamp: f64) {
        self.bbox = bbox;
        self.center = bbox.center();
        self.last_seen_at = timestamp;
        self.missing_frames = 0;
        self.cleanup_candidate_frames = 0;
    }

    /// Record a frame without a matching detection. `human_nearby` is the
    /// cleanup pre-condition for this frame.
    pub fn mark_missing(&mut self, human_nearby: bool) {
        self.missing_frames = self.missing_frames.saturating_add(1);
        if human_nearby {
            self.cleanup_candidate_frames = self.cleanup_candidate_frames.saturating_add(1);
        } else {
            self.cleanup_candidate_frames = 0;
        }
    }

    pub fn mark_cleaned(&mut self, timestamp: f64, frame_id: u64) {
        self.state = DepositState::Cleaned;
        self.cleanup_candidate_frames = 0;
        self.cleaned_at = Some(timestamp);
        self.cleaned_frame = Some(frame_id);
    }

    /// Undo a cleanup after the deposit was detected again.
    pub fn reopen(&mut self, bbox: Rect, timestamp: f64) {
        self.state = DepositState::Active;
        self.cleaned_at = None;
        self.cleaned_frame = None;
        self.update(bbox, timestamp);
    }

    pub fn is_active(&self) -> bool {
        self.state == DepositState::Active
    }

    pub fn is_cleaned(&self) -> bool {
        self.state == DepositState::Cleaned
    }

    pub fn is_stale(&self, stale_threshold: u32) -> bool {
        self.is_active() && self.missing_frames > stale_threshold
    }
}
