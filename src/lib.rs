//! Tracks dog waste deposits across video frames.
//!
//! Per-frame detections (dogs, humans, deposit candidates) go in; a small
//! set of deposits with stable ids and a `pending -> active -> cleaned`
//! lifecycle comes out, together with one event per transition.
//!
//! ```ignore
//! use deposit_track_rs::{DepositTracker, Detection, DogSample, TrackerConfig};
//!
//! let mut tracker = DepositTracker::new(TrackerConfig::default())?;
//! let events = tracker.update(timestamp, &detections, &dog_samples)?;
//! let status = tracker.status();
//! ```

pub mod config;
pub mod integration;
pub mod tracker;

pub use config::{ConfigError, FeedConfig, MonitorConfig};
pub use integration::{
    DetectionBuilder, DetectionSource, DogAssociationConfig, DogAssociator, EventFeed, EventSink,
    IntoDetections, MonitorPipeline, PipelineError, SharedTracker,
};
pub use tracker::{
    Deposit, DepositEvent, DepositEventKind, DepositId, DepositSnapshot, DepositState,
    DepositTracker, Detection, DetectionError, DogId, DogSample, ObjectClass, PostureAnalyzer,
    PostureConfig, PostureSignal, Rect, TrackerConfig, TrackerError, TrackerStatus,
};
