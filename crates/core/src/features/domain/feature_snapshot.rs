use serde::{Deserialize, Serialize};

use crate::shared::geometry::Point;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EyeAspectRatio {
    pub left: f64,
    pub right: f64,
}

impl EyeAspectRatio {
    pub fn average(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    pub fn both_below(&self, threshold: f64) -> bool {
        self.left < threshold && self.right < threshold
    }

    pub fn min(&self) -> f64 {
        self.left.min(self.right)
    }
}

/// Head rotation in degrees. Positive yaw turns toward image-right,
/// positive pitch looks down, positive roll tilts clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Where the eyes point relative to the eye sockets, each axis in [-1, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GazeProxy {
    pub horizontal: f64,
    pub vertical: f64,
}

/// Per-frame measurements derived from one `FaceDetection`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureSnapshot {
    pub eye_aspect_ratio: EyeAspectRatio,
    pub head_pose: HeadPose,
    pub face_center: Point,
    /// Bounding-box diagonal of all landmarks, in pixels.
    pub face_size: f64,
    /// Distance of the face centre from the frame centre over the half-diagonal, in [0, 1].
    pub centering: f64,
    pub gaze: GazeProxy,
    /// Every landmark the pose and EAR need was present.
    pub complete: bool,
}

impl FeatureSnapshot {
    /// Continuous estimate in [0, 1] of how squarely the face points at the screen.
    pub fn screen_facing_confidence(&self) -> f64 {
        let yaw = (1.0 - self.head_pose.yaw.abs() / 45.0).clamp(0.0, 1.0);
        let pitch = (1.0 - self.head_pose.pitch.abs() / 30.0).clamp(0.0, 1.0);
        let centered = (1.0 - self.centering).clamp(0.0, 1.0);
        yaw * pitch * centered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn snapshot(yaw: f64, pitch: f64, centering: f64) -> FeatureSnapshot {
        FeatureSnapshot {
            eye_aspect_ratio: EyeAspectRatio { left: 0.3, right: 0.3 },
            head_pose: HeadPose { yaw, pitch, roll: 0.0 },
            face_center: Point::new(320.0, 240.0),
            face_size: 200.0,
            centering,
            gaze: GazeProxy::default(),
            complete: true,
        }
    }

    #[test]
    fn test_both_below() {
        let ear = EyeAspectRatio { left: 0.1, right: 0.14 };
        assert!(ear.both_below(0.15));
        let one_open = EyeAspectRatio { left: 0.1, right: 0.3 };
        assert!(!one_open.both_below(0.15));
    }

    #[test]
    fn test_screen_facing_confidence_frontal_centered() {
        assert_relative_eq!(snapshot(0.0, 0.0, 0.0).screen_facing_confidence(), 1.0);
    }

    #[test]
    fn test_screen_facing_confidence_partial() {
        // (1 - 15/45) * (1 - 0/30) * (1 - 0.1) = 0.6667 * 0.9
        assert_relative_eq!(
            snapshot(15.0, 0.0, 0.1).screen_facing_confidence(),
            (2.0 / 3.0) * 0.9,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_screen_facing_confidence_turned_away_is_zero() {
        assert_relative_eq!(snapshot(-60.0, 0.0, 0.0).screen_facing_confidence(), 0.0);
    }
}
