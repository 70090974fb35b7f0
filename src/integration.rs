//! Adapters between detection backends, the deposit tracker and its
//! consumers.
//!
//! The tracker itself only knows about detections and dog samples. This
//! module supplies the pieces around it: a trait for detection backends,
//! dog identity association, event sinks and a thread-safe tracker handle.

mod builder;
mod detector;
mod dogs;
mod pipeline;
mod shared;
mod sink;

pub use builder::DetectionBuilder;
pub use detector::{DetectionSource, IntoDetections};
pub use dogs::{DogAssociationConfig, DogAssociator};
pub use pipeline::{MonitorPipeline, PipelineError};
pub use shared::SharedTracker;
pub use sink::{EventFeed, EventSink};
