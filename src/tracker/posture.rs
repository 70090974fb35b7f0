//! Squat detection over a rolling window of per-dog bounding boxes.
//!
//! A dog is considered to be pooping when, over the last
//! `stationary_threshold` seconds, its box center barely moved and its
//! current silhouette is compact (height / width below
//! `aspect_ratio_threshold`). The signal carries the ground point under the
//! dog, where a deposit is expected to show up.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::tracker::rect::Rect;

/// Slack (seconds) for float rounding in the window span.
const SPAN_EPSILON: f64 = 1e-6;

/// Configuration for the PostureAnalyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureConfig {
    /// Seconds a dog must hold still before a trigger
    pub stationary_threshold: f64,
    /// Max height / width of a squatting silhouette
    pub aspect_ratio_threshold: f32,
    /// Max center displacement (pixels) between any two samples in the window
    pub max_displacement_px: f32,
    /// Seconds without a sample after which a dog's window is dropped
    pub dog_timeout: f64,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            stationary_threshold: 3.0,
            aspect_ratio_threshold: 0.8,
            max_displacement_px: 25.0,
            dog_timeout: 1.0,
        }
    }
}

/// Identity of a tracked dog, supplied by whatever associates dog boxes
/// across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DogId(pub u64);

impl fmt::Display for DogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dog#{}", self.0)
    }
}

/// One frame's observation of one dog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DogSample {
    pub dog_id: DogId,
    pub bbox: Rect,
}

impl DogSample {
    pub fn new(dog_id: DogId, bbox: Rect) -> Self {
        Self { dog_id, bbox }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureSignal {
    pub dog_id: DogId,
    pub is_pooping: bool,
    /// Bottom-center of the current box; set only when `is_pooping`
    pub anchor: Option<Point2<f32>>,
}

impl PostureSignal {
    fn idle(dog_id: DogId) -> Self {
        Self {
            dog_id,
            is_pooping: false,
            anchor: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct DogWindow {
    samples: VecDeque<(f64, Rect)>,
    last_seen: f64,
}

impl DogWindow {
    fn push(&mut self, timestamp: f64, bbox: Rect, window: f64) {
        self.samples.push_back((timestamp, bbox));
        self.last_seen = timestamp;

        // Keep one sample at or before the cutoff so the window can span the
        // full duration.
        let cutoff = timestamp - window;
        while self.samples.len() >= 2 && self.samples[1].0 <= cutoff {
            self.samples.pop_front();
        }
    }

    fn span(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.0 - first.0,
            _ => 0.0,
        }
    }

    fn max_displacement(&self) -> f32 {
        let centers: Vec<Point2<f32>> = self.samples.iter().map(|(_, b)| b.center()).collect();
        let mut max = 0.0f32;
        for (i, a) in centers.iter().enumerate() {
            for b in &centers[i + 1..] {
                max = max.max(nalgebra::distance(a, b));
            }
        }
        max
    }

    fn current(&self) -> Option<&Rect> {
        self.samples.back().map(|(_, b)| b)
    }
}

pub struct PostureAnalyzer {
    config: PostureConfig,
    windows: HashMap<DogId, DogWindow>,
}

impl PostureAnalyzer {
    pub fn new(config: PostureConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
        }
    }

    pub fn config(&self) -> &PostureConfig {
        &self.config
    }

    /// Append one sample to the dog's window. Degenerate boxes and samples
    /// older than the dog's newest sample are ignored.
    pub fn push(&mut self, timestamp: f64, sample: &DogSample) {
        if sample.bbox.is_degenerate() {
            debug!("ignoring degenerate box for {}", sample.dog_id);
            return;
        }
        let window = self.windows.entry(sample.dog_id).or_default();
        if window.current().is_some() && timestamp < window.last_seen {
            debug!("ignoring out-of-order sample for {}", sample.dog_id);
            return;
        }
        window.push(timestamp, sample.bbox, self.config.stationary_threshold);
    }

    /// Evaluate the squat test for one dog. Unknown dogs and windows that do
    /// not yet cover `stationary_threshold` seconds report `is_pooping = false`.
    pub fn evaluate(&self, dog_id: DogId) -> PostureSignal {
        let Some(window) = self.windows.get(&dog_id) else {
            return PostureSignal::idle(dog_id);
        };
        let Some(current) = window.current() else {
            return PostureSignal::idle(dog_id);
        };

        let full = window.span() + SPAN_EPSILON >= self.config.stationary_threshold;
        let compact = current.aspect_ratio() < self.config.aspect_ratio_threshold;
        let stationary = window.max_displacement() < self.config.max_displacement_px;

        if full && compact && stationary {
            PostureSignal {
                dog_id,
                is_pooping: true,
                anchor: Some(current.bottom_center()),
            }
        } else {
            PostureSignal::idle(dog_id)
        }
    }

    /// Feed one frame of dog samples and evaluate every dog seen in it.
    ///
    /// Signals come back in first-appearance order of the dog ids.
    pub fn observe(&mut self, timestamp: f64, samples: &[DogSample]) -> Vec<PostureSignal> {
        for sample in samples {
            self.push(timestamp, sample);
        }
        self.prune(timestamp);

        let mut seen = Vec::with_capacity(samples.len());
        for sample in samples.iter().filter(|s| !s.bbox.is_degenerate()) {
            if !seen.contains(&sample.dog_id) {
                seen.push(sample.dog_id);
            }
        }

        seen.into_iter()
            .map(|dog_id| {
                let signal = self.evaluate(dog_id);
                if let Some(anchor) = signal.anchor {
                    debug!(
                        "{} squatting at ({:.1}, {:.1})",
                        dog_id, anchor.x, anchor.y
                    );
                }
                signal
            })
            .collect()
    }

    /// Drop windows of dogs not seen for `dog_timeout` seconds.
    pub fn prune(&mut self, now: f64) {
        let timeout = self.config.dog_timeout;
        self.windows.retain(|_, w| now - w.last_seen <= timeout);
    }

    pub fn tracked_dogs(&self) -> usize {
        self.windows.len()
    }

    /// Number of samples currently buffered for `dog_id`.
    pub fn window_len(&self, dog_id: DogId) -> usize {
        self.windows.get(&dog_id).map_or(0, |w| w.samples.len())
    }
}

impl Default for PostureAnalyzer {
    fn default() -> Self {
        Self::new(PostureConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOG: DogId = DogId(1);

    // 100x60 box whose bottom-center sits on (cx, ground_y).
    fn squat(cx: f32, ground_y: f32) -> DogSample {
        DogSample::new(DOG, Rect::from_tlbr(cx - 50.0, ground_y - 60.0, cx + 50.0, ground_y))
    }

    fn standing(cx: f32, ground_y: f32) -> DogSample {
        DogSample::new(DOG, Rect::from_tlbr(cx - 40.0, ground_y - 90.0, cx + 40.0, ground_y))
    }

    fn feed(analyzer: &mut PostureAnalyzer, frames: u32, sample: impl Fn(u32) -> DogSample) -> PostureSignal {
        let mut last = PostureSignal::idle(DOG);
        for i in 0..frames {
            let t = i as f64 / 10.0;
            last = analyzer.observe(t, &[sample(i)])[0];
        }
        last
    }

    #[test]
    fn test_triggers_after_full_window() {
        let mut analyzer = PostureAnalyzer::default();

        // 2.9s of history is not enough.
        let early = feed(&mut analyzer, 30, |_| squat(500.0, 400.0));
        assert!(!early.is_pooping);

        let signal = analyzer.observe(3.0, &[squat(500.0, 400.0)])[0];
        assert!(signal.is_pooping);
        assert_eq!(signal.anchor, Some(Point2::new(500.0, 400.0)));
    }

    #[test]
    fn test_window_is_bounded() {
        let mut analyzer = PostureAnalyzer::default();
        feed(&mut analyzer, 200, |_| squat(500.0, 400.0));
        // 3.0s at 10 samples per second plus the boundary sample.
        let len = analyzer.window_len(DOG);
        assert!((31..=32).contains(&len), "window holds {len} samples");
    }

    #[test]
    fn test_moving_dog_never_triggers() {
        let mut analyzer = PostureAnalyzer::default();
        let signal = feed(&mut analyzer, 50, |i| squat(300.0 + i as f32 * 2.0, 400.0));
        assert!(!signal.is_pooping);
    }

    #[test]
    fn test_standing_dog_never_triggers() {
        let mut analyzer = PostureAnalyzer::default();
        let signal = feed(&mut analyzer, 50, |_| standing(500.0, 400.0));
        assert!(!signal.is_pooping);
    }

    #[test]
    fn test_degenerate_boxes_are_ignored() {
        let mut analyzer = PostureAnalyzer::default();
        let flat = DogSample::new(DOG, Rect::new(500.0, 340.0, 0.0, 60.0));
        let nan = DogSample::new(DogId(2), Rect::new(f32::NAN, 340.0, 100.0, 60.0));
        for i in 0..40 {
            let signals = analyzer.observe(i as f64 / 10.0, &[flat, nan]);
            assert!(signals.is_empty());
        }
        assert_eq!(analyzer.tracked_dogs(), 0);
    }

    #[test]
    fn test_unknown_dog_is_idle() {
        let analyzer = PostureAnalyzer::default();
        assert!(!analyzer.evaluate(DogId(42)).is_pooping);
    }

    #[test]
    fn test_stale_dogs_are_dropped() {
        let mut analyzer = PostureAnalyzer::default();
        analyzer.observe(0.0, &[squat(500.0, 400.0)]);
        analyzer.observe(0.5, &[DogSample::new(DogId(2), Rect::new(0.0, 0.0, 10.0, 10.0))]);
        assert_eq!(analyzer.tracked_dogs(), 2);

        analyzer.observe(1.6, &[DogSample::new(DogId(2), Rect::new(0.0, 0.0, 10.0, 10.0))]);
        assert_eq!(analyzer.tracked_dogs(), 1);
        assert_eq!(analyzer.window_len(DOG), 0);
    }
}
