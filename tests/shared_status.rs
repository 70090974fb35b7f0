use std::thread;

use deposit_track_rs::{
    DepositEvent, DepositEventKind, Detection, DogId, DogSample, EventSink, ObjectClass, Rect, SharedTracker,
    TrackerConfig,
};

fn squatting_dog() -> DogSample {
    DogSample::new(DogId(7), Rect::from_tlbr(250.0, 240.0, 350.0, 300.0))
}

fn candidate() -> Detection {
    Detection::from_rect(ObjectClass::DepositCandidate, Rect::centered(300.0, 300.0, 30.0), 0.9)
}

fn person() -> Detection {
    Detection::new(ObjectClass::Human, 270.0, 150.0, 330.0, 310.0, 0.9)
}

/// Frame script: squat, confirm, get cleaned, repeat.
fn frame(i: u64) -> (Vec<Detection>, Vec<DogSample>) {
    match i % 60 {
        0..=30 => (vec![], vec![squatting_dog()]),
        31 => (vec![candidate()], vec![]),
        32..=46 => (vec![person()], vec![]),
        _ => (vec![], vec![]),
    }
}

#[test]
fn test_status_reads_see_whole_frames() {
    let tracker = SharedTracker::new(TrackerConfig::default(), 16).unwrap();

    thread::scope(|s| {
        let reader = tracker.clone();
        let handle = s.spawn(move || {
            let mut last_total = 0;
            let mut last_frame = 0;
            for _ in 0..2000 {
                let status = reader.status();
                assert!(status.total_deposits >= last_total);
                assert!(status.frame_id >= last_frame);
                assert!(status.cleaned_count <= status.total_deposits);
                // A deposit is either active or cleaned, never both or neither.
                assert_eq!(
                    status.active.len() as u64 + status.cleaned_count,
                    status.total_deposits
                );
                last_total = status.total_deposits;
                last_frame = status.frame_id;
            }
        });

        for i in 0..300u64 {
            let (detections, dogs) = frame(i);
            tracker.update(i as f64 / 10.0, &detections, &dogs).unwrap();
        }
        handle.join().unwrap();
    });

    let status = tracker.status();
    assert_eq!(status.total_deposits, 5);
    assert_eq!(status.cleaned_count, 5);
    assert!(status.active.is_empty());
}

#[test]
fn test_recent_events_are_bounded() {
    let tracker = SharedTracker::new(TrackerConfig::default(), 3).unwrap();
    let mut collected: Vec<DepositEvent> = Vec::new();
    for i in 0..300u64 {
        let (detections, dogs) = frame(i);
        for event in tracker.update(i as f64 / 10.0, &detections, &dogs).unwrap() {
            collected.publish(&event);
        }
    }
    assert_eq!(collected.len(), 10);

    let recent = tracker.recent_events();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent.as_slice(), &collected[7..]);
    assert_eq!(recent.last().unwrap().kind, DepositEventKind::DepositCleaned);
}

#[test]
fn test_rejected_frame_changes_nothing() {
    let tracker = SharedTracker::default();
    tracker.update(5.0, &[], &[squatting_dog()]).unwrap();
    let before = tracker.status();
    assert!(tracker.update(4.0, &[candidate()], &[]).is_err());
    assert_eq!(tracker.status(), before);
    assert_eq!(tracker.with_tracker(|t| t.posture().tracked_dogs()), 1);
}
