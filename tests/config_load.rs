use std::fs;
use std::path::PathBuf;

use deposit_track_rs::{ConfigError, MonitorConfig};

fn write_temp_config(name: &str, contents: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("deposit-track-test-{}-{}.toml", name, std::process::id()));
    fs::write(&path, contents).expect("write temp config");
    path
}

#[test]
fn loads_config_file() {
    let path = write_temp_config(
        "full",
        r#"
[tracking]
confidence_threshold = 0.4
iou_threshold = 0.25
stale_threshold = 120
cleanup_confirm_frames = 20
cleanup_radius_px = 80.0
pending_grace_period = 60

[tracking.posture]
stationary_threshold = 2.5
aspect_ratio_threshold = 0.7

[dogs]
match_radius_px = 120.0

[feed]
capacity = 10
"#,
    );
    let cfg = MonitorConfig::from_path(&path).expect("load config");
    assert_eq!(cfg.tracking.confidence_threshold, 0.4);
    assert_eq!(cfg.tracking.iou_threshold, 0.25);
    assert_eq!(cfg.tracking.stale_threshold, 120);
    assert_eq!(cfg.tracking.cleanup_confirm_frames, 20);
    assert_eq!(cfg.tracking.cleanup_radius_px, 80.0);
    assert_eq!(cfg.tracking.pending_grace_period, 60);
    assert_eq!(cfg.tracking.posture.stationary_threshold, 2.5);
    assert_eq!(cfg.tracking.posture.aspect_ratio_threshold, 0.7);
    assert_eq!(cfg.tracking.posture.max_displacement_px, 25.0);
    assert_eq!(cfg.dogs.match_radius_px, 120.0);
    assert_eq!(cfg.feed.capacity, 10);
    let _ = fs::remove_file(&path);
}

#[test]
fn missing_file_is_an_io_error() {
    let path = std::env::temp_dir().join("deposit-track-test-does-not-exist.toml");
    let err = MonitorConfig::from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn invalid_threshold_is_rejected() {
    let path = write_temp_config("invalid", "[tracking]\ncleanup_confirm_frames = 0\n");
    let err = MonitorConfig::from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    let _ = fs::remove_file(&path);
}
