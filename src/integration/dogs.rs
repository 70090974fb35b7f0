//! Nearest-neighbor identity for dog detections.
//!
//! The deposit tracker expects a stable id per dog. Detectors only hand out
//! boxes, so this associates each frame's dog boxes with the dogs seen on
//! the previous frames by center distance.

use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::tracker::{Detection, DogId, DogSample, ObjectClass, Rect, nearest_assignment};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DogAssociationConfig {
    /// Max center distance (pixels) between frames for the same dog
    pub match_radius_px: f32,
    /// Frames a dog may go undetected before its id is retired
    pub max_missed_frames: u32,
    pub min_confidence: f32,
}

impl Default for DogAssociationConfig {
    fn default() -> Self {
        Self {
            match_radius_px: 100.0,
            max_missed_frames: 30,
            min_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
struct DogTrack {
    id: DogId,
    center: Point2<f32>,
    missed: u32,
}

pub struct DogAssociator {
    config: DogAssociationConfig,
    tracks: Vec<DogTrack>,
    next_id: u64,
}

impl DogAssociator {
    pub fn new(config: DogAssociationConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    /// Assign ids to this frame's dog detections.
    ///
    /// Non-dog and invalid detections are skipped. Samples come back in
    /// detection order.
    pub fn associate(&mut self, detections: &[Detection]) -> Vec<DogSample> {
        let dogs: Vec<Rect> = detections
            .iter()
            .filter(|d| d.class == ObjectClass::Dog)
            .filter(|d| d.validate(self.config.min_confidence).is_ok())
            .map(|d| d.bbox)
            .collect();

        let centers: Vec<Point2<f32>> = self.tracks.iter().map(|t| t.center).collect();
        let assignment = nearest_assignment(&centers, &dogs, self.config.match_radius_px);

        let mut ids: Vec<Option<DogId>> = vec![None; dogs.len()];
        for (itrack, idog) in assignment.matches {
            let track = &mut self.tracks[itrack];
            track.center = dogs[idog].center();
            track.missed = 0;
            ids[idog] = Some(track.id);
        }
        for itrack in assignment.unmatched_rows {
            self.tracks[itrack].missed += 1;
        }

        let max_missed = self.config.max_missed_frames;
        self.tracks.retain(|t| {
            let keep = t.missed <= max_missed;
            if !keep {
                debug!("{} left the scene", t.id);
            }
            keep
        });

        for idog in assignment.unmatched_cols {
            self.next_id += 1;
            let id = DogId(self.next_id);
            debug!("new dog {}", id);
            self.tracks.push(DogTrack {
                id,
                center: dogs[idog].center(),
                missed: 0,
            });
            ids[idog] = Some(id);
        }

        dogs.iter()
            .zip(ids)
            .filter_map(|(bbox, id)| id.map(|id| DogSample::new(id, *bbox)))
            .collect()
    }

    pub fn tracked_dogs(&self) -> usize {
        self.tracks.len()
    }
}

impl Default for DogAssociator {
    fn default() -> Self {
        Self::new(DogAssociationConfig::default())
    }
}
