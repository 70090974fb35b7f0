//! Deposit lifecycle tracking across frames.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracker::deposit::{Deposit, DepositId, PendingDeposit};
use crate::tracker::event::{DepositEvent, DepositEventKind, DepositSnapshot, TrackerStatus};
use crate::tracker::matching::{self, AssignmentResult, Detection, ObjectClass};
use crate::tracker::posture::{DogId, DogSample, PostureAnalyzer, PostureConfig};
use crate::tracker::rect::{Rect, iou_batch};

/// Configuration for the DepositTracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detections below this confidence never reach the state machine
    pub confidence_threshold: f32,
    /// Minimum IoU to re-match a detection to a known deposit
    pub iou_threshold: f32,
    /// Frames without a detection before an active deposit is reported stale
    pub stale_threshold: u32,
    /// Consecutive cleanup frames needed to mark a deposit cleaned
    pub cleanup_confirm_frames: u32,
    /// Max distance (pixels) between a deposit and a human box for cleanup
    pub cleanup_radius_px: f32,
    /// Frames a pending entry waits for a detection after its last trigger
    pub pending_grace_period: u32,
    /// Radius (pixels) for anchor dedup and pending confirmation
    pub pending_match_radius_px: f32,
    /// Cleaned deposits kept queryable; oldest are evicted first
    pub max_cleaned_retained: usize,
    pub posture: PostureConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            iou_threshold: 0.3,
            stale_threshold: 90,
            cleanup_confirm_frames: 15,
            cleanup_radius_px: 100.0,
            pending_grace_period: 90,
            pending_match_radius_px: 50.0,
            max_cleaned_retained: 32,
            posture: PostureConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Reject thresholds the state machine cannot run with.
    pub fn validate(&self) -> Result<(), TrackerError> {
        let p = &self.posture;
        check(
            (0.0..=1.0).contains(&self.confidence_threshold),
            "confidence_threshold must be within 0..=1",
        )?;
        check(
            self.iou_threshold > 0.0 && self.iou_threshold <= 1.0,
            "iou_threshold must be within (0, 1]",
        )?;
        check(
            self.cleanup_confirm_frames >= 1,
            "cleanup_confirm_frames must be at least 1",
        )?;
        check(
            self.cleanup_radius_px > 0.0,
            "cleanup_radius_px must be positive",
        )?;
        check(
            self.pending_match_radius_px > 0.0,
            "pending_match_radius_px must be positive",
        )?;
        check(
            p.stationary_threshold > 0.0 && p.stationary_threshold.is_finite(),
            "posture.stationary_threshold must be positive",
        )?;
        check(
            p.aspect_ratio_threshold > 0.0,
            "posture.aspect_ratio_threshold must be positive",
        )?;
        check(
            p.max_displacement_px > 0.0,
            "posture.max_displacement_px must be positive",
        )?;
        check(
            p.dog_timeout >= 0.0,
            "posture.dog_timeout must not be negative",
        )
    }
}

fn check(ok: bool, msg: &str) -> Result<(), TrackerError> {
    if ok {
        Ok(())
    } else {
        Err(TrackerError::InvalidConfig(msg.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("invalid tracker config: {0}")]
    InvalidConfig(String),
    #[error("frame timestamp is not finite: {0}")]
    NonFiniteTimestamp(f64),
    #[error("frame timestamp {got} does not follow previous frame at {previous}")]
    OutOfOrderFrame { previous: f64, got: f64 },
}

pub struct DepositTracker {
    pending: Vec<PendingDeposit>,
    deposits: BTreeMap<DepositId, Deposit>,
    posture: PostureAnalyzer,
    frame_id: u64,
    last_timestamp: Option<f64>,
    total_deposits: u64,
    cleaned_count: u64,
    config: TrackerConfig,
}

impl DepositTracker {
    /// Create a tracker, rejecting configs that fail [`TrackerConfig::validate`].
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: TrackerConfig) -> Self {
        Self {
            pending: Vec::new(),
            deposits: BTreeMap::new(),
            posture: PostureAnalyzer::new(config.posture.clone()),
            frame_id: 0,
            last_timestamp: None,
            total_deposits: 0,
            cleaned_count: 0,
            config,
        }
    }

    /// Process one frame and return the lifecycle events it produced.
    ///
    /// Frames must arrive with strictly increasing timestamps. A rejected
    /// frame leaves the tracker untouched.
    pub fn update(
        &mut self,
        timestamp: f64,
        detections: &[Detection],
        dog_samples: &[DogSample],
    ) -> Result<Vec<DepositEvent>, TrackerError> {
        if !timestamp.is_finite() {
            return Err(TrackerError::NonFiniteTimestamp(timestamp));
        }
        if let Some(previous) = self.last_timestamp {
            if timestamp <= previous {
                return Err(TrackerError::OutOfOrderFrame {
                    previous,
                    got: timestamp,
                });
            }
        }

        self.frame_id += 1;
        self.last_timestamp = Some(timestamp);
        let mut events = Vec::new();

        // Drop malformed and low-confidence detections
        let mut candidates = Vec::new();
        let mut humans = Vec::new();
        for det in detections {
            if let Err(err) = det.validate(self.config.confidence_threshold) {
                debug!("frame {}: dropping {:?} detection: {}", self.frame_id, det.class, err);
                continue;
            }
            match det.class {
                ObjectClass::DepositCandidate => candidates.push(det.bbox),
                ObjectClass::Human => humans.push(det.bbox),
                ObjectClass::Dog => {}
            }
        }

        // Step 1: posture triggers open or refresh pending entries
        for signal in self.posture.observe(timestamp, dog_samples) {
            if let Some(anchor) = signal.anchor {
                self.register_trigger(anchor, signal.dog_id, timestamp);
            }
        }

        // Step 2: confirm pending entries against nearby candidates
        let mut claimed = vec![false; candidates.len()];
        let anchors: Vec<Point2<f32>> = self.pending.iter().map(|p| p.anchor).collect();
        let promotions =
            matching::nearest_assignment(&anchors, &candidates, self.config.pending_match_radius_px);

        let mut promoted = vec![false; self.pending.len()];
        let mut confirmed_now = Vec::new();
        for (ipending, icand) in promotions.matches {
            claimed[icand] = true;
            promoted[ipending] = true;

            let deposit = Deposit::confirm(&self.pending[ipending], candidates[icand], timestamp);
            self.total_deposits += 1;
            info!(
                "{} confirmed at ({:.1}, {:.1})",
                deposit.id, deposit.center.x, deposit.center.y
            );
            events.push(DepositEvent::new(
                DepositEventKind::DepositConfirmed,
                &deposit,
                timestamp,
            ));
            confirmed_now.push(deposit.id);
            self.deposits.insert(deposit.id, deposit);
        }
        let mut idx = 0;
        self.pending.retain(|_| {
            let keep = !promoted[idx];
            idx += 1;
            keep
        });

        // Step 3: greedy IoU matching of the remaining candidates against
        // deposits not confirmed on this frame
        let remaining: Vec<Rect> = candidates
            .iter()
            .zip(&claimed)
            .filter(|(_, claimed)| !**claimed)
            .map(|(bbox, _)| *bbox)
            .collect();
        let (ids, known): (Vec<DepositId>, Vec<Rect>) = self
            .deposits
            .values()
            .filter(|d| !confirmed_now.contains(&d.id))
            .map(|d| (d.id, d.bbox))
            .unzip();
        let ious = iou_batch(&known, &remaining);

        let AssignmentResult {
            matches,
            unmatched_rows,
            ..
        } = matching::greedy_assignment(&ious, self.config.iou_threshold);

        let mut reopened = Vec::new();
        for (irow, icol) in matches {
            let Some(deposit) = self.deposits.get_mut(&ids[irow]) else {
                continue;
            };
            if deposit.is_cleaned() {
                reopened.push((ids[irow], remaining[icol]));
            } else {
                deposit.update(remaining[icol], timestamp);
            }
        }

        // Step 4: cleanup evidence for active deposits that went unseen
        for irow in unmatched_rows {
            let Some(deposit) = self.deposits.get_mut(&ids[irow]) else {
                continue;
            };
            if !deposit.is_active() {
                continue;
            }

            let human_nearby = humans
                .iter()
                .any(|h| h.distance_to_point(&deposit.center) <= self.config.cleanup_radius_px);
            deposit.mark_missing(human_nearby);

            if deposit.missing_frames.checked_sub(1) == Some(self.config.stale_threshold) {
                warn!(
                    "{} unseen for {} frames, reporting stale",
                    deposit.id, deposit.missing_frames
                );
            }

            if deposit.cleanup_candidate_frames >= self.config.cleanup_confirm_frames {
                deposit.mark_cleaned(timestamp, self.frame_id);
                self.cleaned_count += 1;
                info!("{} cleaned", deposit.id);
                events.push(DepositEvent::new(
                    DepositEventKind::DepositCleaned,
                    deposit,
                    timestamp,
                ));
            }
        }

        // Step 5: a cleaned deposit seen again was a false cleanup
        for (id, bbox) in reopened {
            let Some(deposit) = self.deposits.get_mut(&id) else {
                continue;
            };
            deposit.reopen(bbox, timestamp);
            self.cleaned_count = self.cleaned_count.saturating_sub(1);
            info!("{} detected again after cleanup, reopening", deposit.id);
            events.push(DepositEvent::new(
                DepositEventKind::DepositDetected,
                deposit,
                timestamp,
            ));
        }

        // Step 6: forget pending entries nobody confirmed
        let frame_id = self.frame_id;
        let grace = u64::from(self.config.pending_grace_period);
        self.pending.retain(|p| {
            let keep = p.frames_since_trigger(frame_id) <= grace;
            if !keep {
                debug!(
                    "discarding unconfirmed trigger at ({:.1}, {:.1})",
                    p.anchor.x, p.anchor.y
                );
            }
            keep
        });

        self.evict_cleaned();

        Ok(events)
    }

    fn register_trigger(&mut self, anchor: Point2<f32>, dog_id: DogId, timestamp: f64) {
        let radius = self.config.pending_match_radius_px;

        let nearest_pending = self
            .pending
            .iter_mut()
            .map(|p| (nalgebra::distance(&p.anchor, &anchor), p))
            .filter(|(dist, _)| *dist <= radius)
            .min_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((_, pending)) = nearest_pending {
            pending.refresh(self.frame_id);
            return;
        }

        if let Some(deposit) = self
            .deposits
            .values()
            .find(|d| d.is_active() && nalgebra::distance(&d.center, &anchor) <= radius)
        {
            debug!("trigger from {} covered by {}", dog_id, deposit.id);
            return;
        }

        info!(
            "{} squatting at ({:.1}, {:.1}), pending confirmation",
            dog_id, anchor.x, anchor.y
        );
        self.pending
            .push(PendingDeposit::new(anchor, dog_id, timestamp, self.frame_id));
    }

    fn evict_cleaned(&mut self) {
        let mut cleaned: Vec<(u64, DepositId)> = self
            .deposits
            .values()
            .filter_map(|d| d.cleaned_frame.map(|frame| (frame, d.id)))
            .collect();
        if cleaned.len() <= self.config.max_cleaned_retained {
            return;
        }
        cleaned.sort();
        let excess = cleaned.len() - self.config.max_cleaned_retained;
        for (_, id) in cleaned.into_iter().take(excess) {
            debug!("evicting {} from history", id);
            self.deposits.remove(&id);
        }
    }

    /// Snapshot of the current state.
    pub fn status(&self) -> TrackerStatus {
        let stale_threshold = self.config.stale_threshold;
        let snapshot = |d: &Deposit| DepositSnapshot::new(d, stale_threshold);
        TrackerStatus {
            frame_id: self.frame_id,
            timestamp: self.last_timestamp,
            active: self.deposits.values().filter(|d| d.is_active()).map(snapshot).collect(),
            cleaned: self.deposits.values().filter(|d| d.is_cleaned()).map(snapshot).collect(),
            pending_count: self.pending.len(),
            cleaned_count: self.cleaned_count,
            total_deposits: self.total_deposits,
        }
    }

    pub fn deposit(&self, id: DepositId) -> Option<&Deposit> {
        self.deposits.get(&id)
    }

    pub fn deposits(&self) -> impl Iterator<Item = &Deposit> {
        self.deposits.values()
    }

    pub fn pending(&self) -> &[PendingDeposit] {
        &self.pending
    }

    pub fn total_deposits(&self) -> u64 {
        self.total_deposits
    }

    pub fn cleaned_count(&self) -> u64 {
        self.cleaned_count
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn posture(&self) -> &PostureAnalyzer {
        &self.posture
    }
}

impl Default for DepositTracker {
    fn default() -> Self {
        Self::with_valid_config(TrackerConfig::default())
    }
}
