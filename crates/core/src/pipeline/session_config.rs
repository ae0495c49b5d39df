use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::domain::feature_computer::FeatureConfig;
use crate::reporting::infrastructure::http_session_reporter::ReporterConfig;
use crate::scoring::domain::scoring_engine::ScoringConfig;
use crate::tracking::domain::temporal_tracker::TrackingConfig;

/// Highest closed-eyes score accepted; sustained closure must read as near zero.
const MAX_CLOSED_EYES_SCORE: u8 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Local capture device id: camera index, device path or a video file.
    pub device: String,
    /// How long to wait on an external stream before re-checking liveness.
    pub frame_timeout_ms: u64,
    pub features: FeatureConfig,
    pub tracking: TrackingConfig,
    pub scoring: ScoringConfig,
    /// Periodic reporting is off when absent.
    pub reporter: Option<ReporterConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            device: "0".to_string(),
            frame_timeout_ms: 100,
            features: FeatureConfig::default(),
            tracking: TrackingConfig::default(),
            scoring: ScoringConfig::default(),
            reporter: None,
        }
    }
}

impl TrackerConfig {
    /// `<config dir>/Attention Tracker/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Attention Tracker").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.tracking;
        let s = &self.scoring;
        let ideal = &s.ideal;

        check(
            t.closed_eye_threshold > 0.0 && t.closed_eye_threshold < 1.0,
            "tracking.closed_eye_threshold must be in (0, 1)",
        )?;
        check(t.sustained_closure_ms > 0, "tracking.sustained_closure_ms must be positive")?;
        check(t.blink_rate_window_ms > 0, "tracking.blink_rate_window_ms must be positive")?;
        check(
            t.oscillation_window >= 2 && t.oscillation_window <= t.angle_history_capacity,
            "tracking.oscillation_window must be between 2 and angle_history_capacity",
        )?;
        check(
            t.min_swing_deg.is_finite() && t.min_swing_deg >= 0.0,
            "tracking.min_swing_deg must be non-negative",
        )?;
        check(
            t.movement_tolerance.is_finite() && t.movement_tolerance > 0.0,
            "tracking.movement_tolerance must be positive",
        )?;

        for (name, score) in [
            ("closed_eyes_score", s.closed_eyes_score),
            ("shaking_score", s.shaking_score),
            ("nodding_score", s.nodding_score),
            ("ideal_score", s.ideal_score),
            ("partial_score", s.partial_score),
        ] {
            check(score <= 100, &format!("scoring.{name} must be at most 100"))?;
        }
        check(
            s.closed_eyes_score <= MAX_CLOSED_EYES_SCORE,
            &format!("scoring.closed_eyes_score must be at most {MAX_CLOSED_EYES_SCORE}"),
        )?;
        check(
            s.smoothing_window >= 1 && s.smoothing_window <= t.score_history_capacity,
            "scoring.smoothing_window must be between 1 and tracking.score_history_capacity",
        )?;
        let limits = [
            ideal.max_abs_yaw_deg,
            ideal.max_abs_pitch_deg,
            ideal.max_abs_roll_deg,
            ideal.max_centering,
            ideal.min_eye_aspect_ratio,
            ideal.min_confidence,
        ];
        check(
            limits.iter().all(|v| v.is_finite() && *v >= 0.0),
            "scoring.ideal thresholds must be finite and non-negative",
        )?;

        if let Some(r) = &self.reporter {
            check(
                r.endpoint.starts_with("http://") || r.endpoint.starts_with("https://"),
                "reporter.endpoint must be an http(s) URL",
            )?;
            check(!r.student_id.trim().is_empty(), "reporter.student_id must not be empty")?;
            check(r.interval_ms > 0, "reporter.interval_ms must be positive")?;
            check(r.timeout_ms > 0, "reporter.timeout_ms must be positive")?;
        }
        Ok(())
    }
}

fn check(ok: bool, message: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid(message.to_string()))
    }
}
