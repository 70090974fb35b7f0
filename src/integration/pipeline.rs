//! MonitorPipeline for combining detection with deposit tracking.

use thiserror::Error;

use super::dogs::DogAssociator;
use super::shared::SharedTracker;
use super::sink::EventSink;
use super::DetectionSource;
use crate::tracker::{DepositEvent, TrackerError};

#[derive(Debug, Error)]
pub enum PipelineError<E: std::error::Error + 'static> {
    #[error("detection failed")]
    Detector(#[source] E),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Detector, dog association and deposit tracking run frame by frame.
///
/// The tracker handle can be cloned out with [`MonitorPipeline::tracker`]
/// and queried from other threads while frames are being processed.
pub struct MonitorPipeline<D: DetectionSource> {
    detector: D,
    dogs: DogAssociator,
    tracker: SharedTracker,
    sinks: Vec<Box<dyn EventSink + Send>>,
}

impl<D> MonitorPipeline<D>
where
    D: DetectionSource,
    D::Error: std::error::Error + 'static,
{
    pub fn new(detector: D, dogs: DogAssociator, tracker: SharedTracker) -> Self {
        Self {
            detector,
            dogs,
            tracker,
            sinks: Vec::new(),
        }
    }

    pub fn with_default_config(detector: D) -> Self {
        Self::new(detector, DogAssociator::default(), SharedTracker::default())
    }

    /// Forward every emitted event to `sink` as well.
    pub fn add_sink(&mut self, sink: Box<dyn EventSink + Send>) {
        self.sinks.push(sink);
    }

    /// Detect objects in one frame and advance the tracker.
    ///
    /// Returns the lifecycle events emitted for this frame.
    pub fn process_frame(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
        timestamp: f64,
    ) -> Result<Vec<DepositEvent>, PipelineError<D::Error>> {
        let detections = self
            .detector
            .detect(input, width, height)
            .map_err(PipelineError::Detector)?;
        let dog_samples = self.dogs.associate(&detections);
        let events = self.tracker.update(timestamp, &detections, &dog_samples)?;

        for sink in &mut self.sinks {
            for event in &events {
                sink.publish(event);
            }
        }
        Ok(events)
    }

    pub fn tracker(&self) -> &SharedTracker {
        &self.tracker
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{Detection, DepositEventKind, ObjectClass, Rect};

    /// Replays a scripted list of frames, one per call.
    struct ScriptedDetector {
        frames: Vec<Vec<Detection>>,
        next: usize,
    }

    impl DetectionSource for ScriptedDetector {
        type Error = std::io::Error;

        fn detect(
            &mut self,
            _input: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<Detection>, Self::Error> {
            let frame = self.frames.get(self.next).cloned().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "script exhausted")
            })?;
            self.next += 1;
            Ok(frame)
        }
    }

    fn squatting_dog() -> Detection {
        Detection::from_rect(ObjectClass::Dog, Rect::from_tlbr(450.0, 340.0, 550.0, 400.0), 0.95)
    }

    #[test]
    fn test_pipeline_confirms_deposit() {
        let mut frames = vec![vec![squatting_dog()]; 31];
        frames.push(vec![Detection::from_rect(
            ObjectClass::DepositCandidate,
            Rect::centered(505.0, 405.0, 30.0),
            0.85,
        )]);
        let detector = ScriptedDetector { frames, next: 0 };
        let mut pipeline = MonitorPipeline::with_default_config(detector);

        let mut all = Vec::new();
        for i in 0..32 {
            all.extend(pipeline.process_frame(&[], 640, 480, i as f64 / 10.0).unwrap());
        }

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kind, DepositEventKind::DepositConfirmed);
        assert_eq!(pipeline.tracker().status().total_deposits, 1);
        assert_eq!(pipeline.tracker().recent_events(), all);
    }

    #[test]
    fn test_detector_errors_propagate() {
        let detector = ScriptedDetector {
            frames: Vec::new(),
            next: 0,
        };
        let mut pipeline = MonitorPipeline::with_default_config(detector);
        let err = pipeline.process_frame(&[], 640, 480, 0.0).unwrap_err();
        assert!(matches!(err, PipelineError::Detector(_)));
    }
}
