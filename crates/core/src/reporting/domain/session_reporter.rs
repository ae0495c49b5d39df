use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::domain::feature_snapshot::{EyeAspectRatio, FeatureSnapshot, GazeProxy, HeadPose};
use crate::scoring::domain::attention_report::AttentionReport;
use crate::shared::frame::Frame;
use crate::tracking::domain::temporal_tracker::TemporalSignals;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to encode frame: {0}")]
    Encode(String),
    #[error("report needs a frame but none was captured")]
    MissingFrame,
    #[error("report request failed: {0}")]
    Transport(String),
    #[error("report endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unreadable report response: {0}")]
    InvalidResponse(String),
}

/// Latest per-frame measurements, shaped for the remote logging service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureBundle {
    pub face_detected: bool,
    pub eye_aspect_ratio: EyeAspectRatio,
    pub gaze_direction: GazeProxy,
    pub head_pose: HeadPose,
    /// Blinks per minute over the trailing window.
    pub blink_rate: f64,
    pub movement_stability: f64,
    /// Seconds the eyes have been continuously open.
    #[serde(rename = "eyesOpenDuration")]
    pub eyes_open_duration_s: f64,
    pub looking_at_screen_confidence: f64,
    pub attention_score: u8,
    pub timestamp: u64,
}

impl FeatureBundle {
    pub fn no_face(report: &AttentionReport) -> Self {
        Self {
            face_detected: false,
            eye_aspect_ratio: EyeAspectRatio { left: 0.0, right: 0.0 },
            gaze_direction: GazeProxy::default(),
            head_pose: HeadPose::default(),
            blink_rate: 0.0,
            movement_stability: 0.0,
            eyes_open_duration_s: 0.0,
            looking_at_screen_confidence: 0.0,
            attention_score: report.score,
            timestamp: report.timestamp_ms,
        }
    }

    pub fn from_face(
        snapshot: &FeatureSnapshot,
        signals: &TemporalSignals,
        report: &AttentionReport,
    ) -> Self {
        Self {
            face_detected: true,
            eye_aspect_ratio: snapshot.eye_aspect_ratio,
            gaze_direction: snapshot.gaze,
            head_pose: snapshot.head_pose,
            blink_rate: signals.blink_rate_per_min,
            movement_stability: signals.movement_stability,
            eyes_open_duration_s: signals.eyes_open_duration_ms as f64 / 1000.0,
            looking_at_screen_confidence: snapshot.screen_facing_confidence(),
            attention_score: report.score,
            timestamp: report.timestamp_ms,
        }
    }
}

/// What the logging service answered, if anything useful.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ReportAck {
    #[serde(default)]
    pub attention_score: Option<f64>,
}

/// Ships a snapshot of the live session to a remote logging endpoint.
///
/// Called off the frame loop; failures are reported to the caller, who logs
/// and drops them.
pub trait SessionReporter: Send {
    fn submit(&mut self, frame: Option<&Frame>, bundle: &FeatureBundle) -> Result<ReportAck, ReportError>;
}
