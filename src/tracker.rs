mod deposit;
mod deposit_state;
mod deposit_tracker;
mod event;
mod matching;
mod posture;
mod rect;

pub use deposit::{Deposit, DepositId, PendingDeposit};
pub use deposit_state::DepositState;
pub use deposit_tracker::{DepositTracker, TrackerConfig, TrackerError};
pub use event::{DepositEvent, DepositEventKind, DepositSnapshot, TrackerStatus};
pub use matching::{
    AssignmentResult, Detection, DetectionError, ObjectClass, greedy_assignment, nearest_assignment,
};
pub use posture::{DogId, DogSample, PostureAnalyzer, PostureConfig, PostureSignal};
pub use rect::{Rect, iou_batch};
