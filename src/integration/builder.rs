//! Builder for creating Detection objects from various input formats.

use crate::tracker::{Detection, ObjectClass, Rect};

/// Builder for creating `Detection` objects from various input formats.
#[derive(Debug, Clone)]
pub struct DetectionBuilder {
    class: ObjectClass,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
}

impl DetectionBuilder {
    pub fn new(class: ObjectClass) -> Self {
        Self {
            class,
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: 0.0,
            confidence: 0.0,
        }
    }

    pub fn dog() -> Self {
        Self::new(ObjectClass::Dog)
    }

    pub fn human() -> Self {
        Self::new(ObjectClass::Human)
    }

    pub fn deposit_candidate() -> Self {
        Self::new(ObjectClass::DepositCandidate)
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.x1 = cx - w / 2.0;
        self.y1 = cy - h / 2.0;
        self.x2 = cx + w / 2.0;
        self.y2 = cy + h / 2.0;
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, l: f32, t: f32, w: f32, h: f32) -> Self {
        self.x1 = l;
        self.y1 = t;
        self.x2 = l + w;
        self.y2 = t + h;
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn build(self) -> Detection {
        Detection::from_rect(
            self.class,
            Rect::from_tlbr(self.x1, self.y1, self.x2, self.y2),
            self.confidence,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_builder() {
        let det = DetectionBuilder::deposit_candidate()
            .xywh(500.0, 400.0, 30.0, 20.0)
            .confidence(0.85)
            .build();

        assert_eq!(det.class, ObjectClass::DepositCandidate);
        assert_eq!(det.confidence, 0.85);
        assert_eq!(det.bbox.to_tlbr(), [485.0, 390.0, 515.0, 410.0]);
    }

    #[test]
    fn test_tlwh_is_left_top_first() {
        let det = DetectionBuilder::human().tlwh(10.0, 20.0, 30.0, 40.0).confidence(0.9).build();
        assert_eq!(det.bbox.to_tlwh(), [10.0, 20.0, 30.0, 40.0]);
    }
}
