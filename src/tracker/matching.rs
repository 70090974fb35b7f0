//! Detection input and the matching rules used by the deposit tracker.

use std::cmp::Ordering;

use nalgebra::Point2;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracker::rect::Rect;

/// Object classes the tracker cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Dog,
    Human,
    DepositCandidate,
}

/// Detection input for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: ObjectClass,
    pub bbox: Rect,
    /// Detection confidence score in `0..=1`
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("degenerate bounding box: {0:?}")]
    DegenerateBox(Rect),
    #[error("confidence out of range: {0}")]
    InvalidConfidence(f32),
    #[error("confidence {confidence} below threshold {threshold}")]
    BelowThreshold { confidence: f32, threshold: f32 },
}

impl Detection {
    pub fn new(class: ObjectClass, x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            class,
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            confidence,
        }
    }

    pub fn from_rect(class: ObjectClass, bbox: Rect, confidence: f32) -> Self {
        Self {
            class,
            bbox,
            confidence,
        }
    }

    /// Check that the detection is usable at the given confidence threshold.
    pub fn validate(&self, min_confidence: f32) -> Result<(), DetectionError> {
        if self.bbox.is_degenerate() {
            return Err(DetectionError::DegenerateBox(self.bbox));
        }
        if self.confidence.is_nan() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(DetectionError::InvalidConfidence(self.confidence));
        }
        if self.confidence < min_confidence {
            return Err(DetectionError::BelowThreshold {
                confidence: self.confidence,
                threshold: min_confidence,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    /// `(row, col)` pairs, in the order they were assigned
    pub matches: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

/// Greedy highest-score-first assignment over an IoU matrix.
///
/// Every pair with `iou >= thresh` is a candidate. Candidates are taken in
/// descending IoU order (ties broken by row, then column) and each row and
/// column is used at most once. The result depends only on the matrix.
pub fn greedy_assignment(ious: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (rows, cols) = ious.dim();
    let mut pairs = Vec::new();
    for i in 0..rows {
        for j in 0..cols {
            let score = ious[[i, j]];
            if score >= thresh {
                pairs.push((i, j, score));
            }
        }
    }
    pairs.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
            .then(a.1.cmp(&b.1))
    });
    assign_pairs(&pairs, rows, cols)
}

/// Nearest-first assignment of points to boxes by center distance.
///
/// Pairs farther apart than `radius` are never matched. Ties are broken by
/// point index, then box index.
pub fn nearest_assignment(points: &[Point2<f32>], boxes: &[Rect], radius: f32) -> AssignmentResult {
    let mut pairs = Vec::new();
    for (i, p) in points.iter().enumerate() {
        for (j, b) in boxes.iter().enumerate() {
            let dist = nalgebra::distance(p, &b.center());
            if dist <= radius {
                pairs.push((i, j, dist));
            }
        }
    }
    pairs.sort_by(|a, b| {
        a.2.partial_cmp(&b.2)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
            .then(a.1.cmp(&b.1))
    });
    assign_pairs(&pairs, points.len(), boxes.len())
}

fn assign_pairs(pairs: &[(usize, usize, f32)], rows: usize, cols: usize) -> AssignmentResult {
    let mut row_used = vec![false; rows];
    let mut col_used = vec![false; cols];
    let mut matches = Vec::new();

    for &(i, j, _) in pairs {
        if row_used[i] || col_used[j] {
            continue;
        }
        row_used[i] = true;
        col_used[j] = true;
        matches.push((i, j));
    }

    AssignmentResult {
        matches,
        unmatched_rows: (0..rows).filter(|&i| !row_used[i]).collect(),
        unmatched_cols: (0..cols).filter(|&j| !col_used[j]).collect(),
    }
}
