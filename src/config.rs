use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::integration::{DogAssociationConfig, EventFeed};
use crate::tracker::{TrackerConfig, TrackerError};

const DEFAULT_CONFIG_NAME: &str = "deposit-track.toml";
const CONFIG_ENV: &str = "DEPOSIT_TRACK_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Number of recent events kept for status consumers
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: EventFeed::default().capacity(),
        }
    }
}

/// Top-level configuration file. Every field may be omitted.
///
/// ```toml
/// [tracking]
/// iou_threshold = 0.3
/// cleanup_confirm_frames = 15
///
/// [tracking.posture]
/// stationary_threshold = 3.0
///
/// [dogs]
/// match_radius_px = 100.0
///
/// [feed]
/// capacity = 50
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub tracking: TrackerConfig,
    pub dogs: DogAssociationConfig,
    pub feed: FeedConfig,
}

impl MonitorConfig {
    /// Load from `$DEPOSIT_TRACK_CONFIG`, else `deposit-track.toml` in the
    /// working directory, else defaults. Unreadable or invalid files fall
    /// back to defaults with a warning.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME));
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::from_path(&path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("ignoring {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracking.validate().map_err(|err| match err {
            TrackerError::InvalidConfig(msg) => ConfigError::Invalid(format!("tracking.{msg}")),
            other => ConfigError::Invalid(other.to_string()),
        })?;
        check(
            self.dogs.match_radius_px > 0.0,
            "dogs.match_radius_px must be positive",
        )?;
        check(
            (0.0..=1.0).contains(&self.dogs.min_confidence),
            "dogs.min_confidence must be within 0..=1",
        )
    }
}

fn check(ok: bool, msg: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let cfg = MonitorConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, MonitorConfig::default());
        assert_eq!(cfg.tracking.iou_threshold, 0.3);
        assert_eq!(cfg.tracking.cleanup_confirm_frames, 15);
        assert_eq!(cfg.tracking.posture.aspect_ratio_threshold, 0.8);
        assert_eq!(cfg.feed.capacity, 50);
    }

    #[test]
    fn test_partial_override() {
        let cfg = MonitorConfig::from_toml_str(
            "[tracking]\ncleanup_confirm_frames = 5\n\n[tracking.posture]\nstationary_threshold = 1.5\n",
        )
        .unwrap();
        assert_eq!(cfg.tracking.cleanup_confirm_frames, 5);
        assert_eq!(cfg.tracking.posture.stationary_threshold, 1.5);
        assert_eq!(cfg.tracking.stale_threshold, 90);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = MonitorConfig::from_toml_str("[tracking]\niou_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = MonitorConfig::from_toml_str("[tracking]\niou_threshold = \"high\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_tracking_errors_name_the_section() {
        let err = MonitorConfig::from_toml_str("[tracking.posture]\nmax_displacement_px = 0.0\n")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid config value: tracking.posture.max_displacement_px must be positive"
        );
    }

    #[test]
    fn test_max_stale_threshold_runs() {
        let cfg = MonitorConfig::from_toml_str("[tracking]\nstale_threshold = 4294967295\n").unwrap();
        let mut tracker = crate::tracker::DepositTracker::new(cfg.tracking).unwrap();
        for i in 0..5 {
            tracker.update(i as f64, &[], &[]).unwrap();
        }
        assert_eq!(tracker.frame_id(), 5);
    }
}
