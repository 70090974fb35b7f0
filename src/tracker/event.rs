//! Lifecycle events and status snapshots produced by the tracker.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::tracker::deposit::{Deposit, DepositId};
use crate::tracker::deposit_state::DepositState;
use crate::tracker::posture::DogId;
use crate::tracker::rect::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositEventKind {
    /// A cleaned deposit was detected again and is active once more
    DepositDetected,
    /// A posture trigger was confirmed by a detection
    DepositConfirmed,
    DepositCleaned,
}

/// One lifecycle transition. Exactly one event is emitted per transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositEvent {
    #[serde(rename = "type")]
    pub kind: DepositEventKind,
    pub id: DepositId,
    pub location: Point2<f32>,
    pub timestamp: f64,
}

impl DepositEvent {
    pub(crate) fn new(kind: DepositEventKind, deposit: &Deposit, timestamp: f64) -> Self {
        Self {
            kind,
            id: deposit.id,
            location: deposit.center,
            timestamp,
        }
    }
}

/// Read-only copy of a deposit, as served by status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositSnapshot {
    pub id: DepositId,
    pub state: DepositState,
    pub bbox: Rect,
    pub center: Point2<f32>,
    pub created_at: f64,
    pub last_seen_at: f64,
    pub missing_frames: u32,
    pub cleanup_candidate_frames: u32,
    /// Active but unseen for more than `stale_threshold` frames
    pub stale: bool,
    pub originating_dog_id: Option<DogId>,
    pub cleaned_at: Option<f64>,
}

impl DepositSnapshot {
    pub(crate) fn new(deposit: &Deposit, stale_threshold: u32) -> Self {
        Self {
            id: deposit.id,
            state: deposit.state,
            bbox: deposit.bbox,
            center: deposit.center,
            created_at: deposit.created_at,
            last_seen_at: deposit.last_seen_at,
            missing_frames: deposit.missing_frames,
            cleanup_candidate_frames: deposit.cleanup_candidate_frames,
            stale: deposit.is_stale(stale_threshold),
            originating_dog_id: deposit.originating_dog_id,
            cleaned_at: deposit.cleaned_at,
        }
    }
}

/// Point-in-time view of the tracker, consistent with one completed frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerStatus {
    pub frame_id: u64,
    pub timestamp: Option<f64>,
    pub active: Vec<DepositSnapshot>,
    /// Cleaned deposits still retained in history
    pub cleaned: Vec<DepositSnapshot>,
    pub pending_count: usize,
    pub cleaned_count: u64,
    pub total_deposits: u64,
}

impl TrackerStatus {
    pub fn stale_count(&self) -> usize {
        self.active.iter().filter(|d| d.stale).count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
