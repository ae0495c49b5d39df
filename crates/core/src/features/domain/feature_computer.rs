//! Stateless transform from raw landmarks to normalized per-frame features.
//!
//! Missing or degenerate landmarks never fail the computation: each feature
//! falls back to a neutral value and the snapshot is marked incomplete.

use serde::{Deserialize, Serialize};

use crate::detection::domain::face_detection::{landmarks, FaceDetection};
use crate::features::domain::feature_snapshot::{
    EyeAspectRatio, FeatureSnapshot, GazeProxy, HeadPose,
};
use crate::shared::constants::DEFAULT_EYE_ASPECT_RATIO;
use crate::shared::frame::FrameSize;
use crate::shared::geometry::{bounding_box, safe_ratio, Point};

/// Nose-tip height between forehead and chin on a level head.
pub const DEFAULT_NEUTRAL_NOSE_RATIO: f64 = 0.55;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub default_eye_aspect_ratio: f64,
    pub neutral_nose_ratio: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            default_eye_aspect_ratio: DEFAULT_EYE_ASPECT_RATIO,
            neutral_nose_ratio: DEFAULT_NEUTRAL_NOSE_RATIO,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FeatureComputer {
    config: FeatureConfig,
}

impl FeatureComputer {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn compute(&self, detection: &FaceDetection, frame: FrameSize) -> FeatureSnapshot {
        let default_ear = self.config.default_eye_aspect_ratio;
        let left = eye_aspect_ratio(detection, &landmarks::LEFT_EYE);
        let right = eye_aspect_ratio(detection, &landmarks::RIGHT_EYE);
        let eye_aspect_ratio = EyeAspectRatio {
            left: left.unwrap_or(default_ear),
            right: right.unwrap_or(default_ear),
        };

        let (yaw, yaw_ok) = estimate_yaw(detection);
        let (pitch, pitch_ok) = estimate_pitch(detection, self.config.neutral_nose_ratio);
        let (roll, roll_ok) = estimate_roll(detection);
        let head_pose = HeadPose { yaw, pitch, roll };

        let points: Vec<Point> = detection
            .keypoints()
            .values()
            .copied()
            .filter(Point::is_finite)
            .collect();
        let (face_center, face_size) = match bounding_box(&points) {
            Some([x1, y1, x2, y2]) => {
                let center = Point::new((x1 + x2) / 2.0, (y1 + y2) / 2.0);
                (center, Point::new(x1, y1).distance(&Point::new(x2, y2)))
            }
            None => {
                let (cx, cy) = frame.center();
                (Point::new(cx, cy), 0.0)
            }
        };

        let (fcx, fcy) = frame.center();
        let offset = face_center.distance(&Point::new(fcx, fcy));
        let centering = safe_ratio(offset, frame.half_diagonal(), 1.0).clamp(0.0, 1.0);

        FeatureSnapshot {
            eye_aspect_ratio,
            head_pose,
            face_center,
            face_size,
            centering,
            gaze: gaze(detection, &head_pose),
            complete: left.is_some() && right.is_some() && yaw_ok && pitch_ok && roll_ok,
        }
    }
}

/// EAR = (|p2 - p6| + |p3 - p5|) / (2 |p1 - p4|), or `None` when any of the
/// six landmarks is missing or the eye width collapses to zero.
fn eye_aspect_ratio(detection: &FaceDetection, indices: &[usize; 6]) -> Option<f64> {
    let mut p = [Point::new(0.0, 0.0); 6];
    for (slot, &idx) in p.iter_mut().zip(indices) {
        *slot = detection.keypoint(idx)?;
    }

    let vertical = p[1].distance(&p[5]) + p[2].distance(&p[4]);
    let horizontal = p[0].distance(&p[3]);
    if horizontal < f64::EPSILON {
        return None;
    }
    let ear = vertical / (2.0 * horizontal);
    ear.is_finite().then_some(ear)
}

/// Outer eye corners, falling back to the cheek contour.
fn lateral_anchors(detection: &FaceDetection) -> Option<(Point, Point)> {
    let corners = detection
        .keypoint(landmarks::LEFT_EYE_OUTER)
        .zip(detection.keypoint(landmarks::RIGHT_EYE_OUTER));
    corners.or_else(|| {
        detection
            .keypoint(landmarks::LEFT_CHEEK)
            .zip(detection.keypoint(landmarks::RIGHT_CHEEK))
    })
}

fn estimate_yaw(detection: &FaceDetection) -> (f64, bool) {
    let (Some(nose), Some((left, right))) = (
        detection.keypoint(landmarks::NOSE_TIP),
        lateral_anchors(detection),
    ) else {
        return (0.0, false);
    };
    let span = (right.x - left.x).abs();
    if span < f64::EPSILON {
        return (0.0, false);
    }
    let mid = left.midpoint(&right);
    let ratio = safe_ratio(nose.x - mid.x, span, 0.0).clamp(-1.0, 1.0);
    (ratio * 90.0, true)
}

fn estimate_pitch(detection: &FaceDetection, neutral_ratio: f64) -> (f64, bool) {
    let (Some(nose), Some(forehead), Some(chin)) = (
        detection.keypoint(landmarks::NOSE_TIP),
        detection.keypoint(landmarks::FOREHEAD),
        detection.keypoint(landmarks::CHIN),
    ) else {
        return (0.0, false);
    };
    let face_height = chin.y - forehead.y;
    if face_height.abs() < f64::EPSILON {
        return (0.0, false);
    }
    let ratio = safe_ratio(nose.y - forehead.y, face_height, neutral_ratio);
    ((2.0 * (ratio - neutral_ratio)).clamp(-1.0, 1.0) * 90.0, true)
}

fn estimate_roll(detection: &FaceDetection) -> (f64, bool) {
    let (Some(left), Some(right)) = (
        detection.keypoint(landmarks::LEFT_EYE_OUTER),
        detection.keypoint(landmarks::RIGHT_EYE_OUTER),
    ) else {
        return (0.0, false);
    };
    let dx = right.x - left.x;
    let dy = right.y - left.y;
    if dx.abs() < f64::EPSILON && dy.abs() < f64::EPSILON {
        return (0.0, false);
    }
    (dy.atan2(dx).to_degrees(), true)
}

/// Iris offset within each eye when iris landmarks exist; otherwise the
/// head pose stands in as the gaze direction.
fn gaze(detection: &FaceDetection, pose: &HeadPose) -> GazeProxy {
    let eyes = [
        (landmarks::LEFT_IRIS, landmarks::LEFT_EYE[0], landmarks::LEFT_EYE[3]),
        (landmarks::RIGHT_IRIS, landmarks::RIGHT_EYE[0], landmarks::RIGHT_EYE[3]),
    ];

    let mut sum_h = 0.0;
    let mut sum_v = 0.0;
    let mut n = 0.0;
    for (iris, a, b) in eyes {
        let (Some(iris), Some(a), Some(b)) = (
            detection.keypoint(iris),
            detection.keypoint(a),
            detection.keypoint(b),
        ) else {
            continue;
        };
        let half_width = a.distance(&b) / 2.0;
        if half_width < f64::EPSILON {
            continue;
        }
        let center = a.midpoint(&b);
        sum_h += safe_ratio(iris.x - center.x, half_width, 0.0);
        sum_v += safe_ratio(iris.y - center.y, half_width, 0.0);
        n += 1.0;
    }

    if n == 0.0 {
        return GazeProxy {
            horizontal: (pose.yaw / 90.0).clamp(-1.0, 1.0),
            vertical: (pose.pitch / 90.0).clamp(-1.0, 1.0),
        };
    }
    GazeProxy {
        horizontal: (sum_h / n).clamp(-1.0, 1.0),
        vertical: (sum_v / n).clamp(-1.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::collections::BTreeMap;

    const FRAME: FrameSize = FrameSize {
        width: 640,
        height: 480,
    };

    /// Frontal face centred in a 640x480 frame with eye openness `h`
    /// (EAR = h / 15) and the nose shifted by `(dx, dy)`.
    fn face(h: f64, dx: f64, dy: f64) -> BTreeMap<usize, Point> {
        let mut m = BTreeMap::new();
        // left eye: corners 270/300, lids at x=280/290
        m.insert(33, Point::new(270.0, 200.0));
        m.insert(160, Point::new(280.0, 200.0 - h));
        m.insert(158, Point::new(290.0, 200.0 - h));
        m.insert(133, Point::new(300.0, 200.0));
        m.insert(153, Point::new(290.0, 200.0 + h));
        m.insert(144, Point::new(280.0, 200.0 + h));
        // right eye: corners 340/370
        m.insert(362, Point::new(340.0, 200.0));
        m.insert(385, Point::new(350.0, 200.0 - h));
        m.insert(387, Point::new(360.0, 200.0 - h));
        m.insert(263, Point::new(370.0, 200.0));
        m.insert(373, Point::new(360.0, 200.0 + h));
        m.insert(380, Point::new(350.0, 200.0 + h));
        m.insert(1, Point::new(320.0 + dx, 260.0 + dy));
        m.insert(10, Point::new(320.0, 150.0));
        m.insert(152, Point::new(320.0, 350.0));
        m.insert(234, Point::new(240.0, 240.0));
        m.insert(454, Point::new(400.0, 240.0));
        m
    }

    fn compute(points: BTreeMap<usize, Point>) -> FeatureSnapshot {
        FeatureComputer::default().compute(&FaceDetection::new(0.95, points), FRAME)
    }

    #[test]
    fn test_frontal_face_features() {
        let s = compute(face(4.5, 0.0, 0.0));
        assert_relative_eq!(s.eye_aspect_ratio.left, 0.3, epsilon = 1e-9);
        assert_relative_eq!(s.eye_aspect_ratio.right, 0.3, epsilon = 1e-9);
        assert_relative_eq!(s.head_pose.yaw, 0.0, epsilon = 1e-9);
        assert_relative_eq!(s.head_pose.pitch, 0.0, epsilon = 1e-9);
        assert_relative_eq!(s.head_pose.roll, 0.0, epsilon = 1e-9);
        // bbox 240..400 x 150..350: centre (320, 250), 10px below frame centre
        assert_relative_eq!(s.face_center.x, 320.0);
        assert_relative_eq!(s.face_center.y, 250.0);
        assert_relative_eq!(s.centering, 10.0 / 400.0, epsilon = 1e-9);
        assert_relative_eq!(s.face_size, (160.0f64.powi(2) + 200.0f64.powi(2)).sqrt());
        assert!(s.complete);
    }

    #[test]
    fn test_closed_eyes_ear() {
        let s = compute(face(1.5, 0.0, 0.0));
        assert_relative_eq!(s.eye_aspect_ratio.average(), 0.1, epsilon = 1e-9);
    }

    #[rstest]
    #[case::turned_right(50.0, 45.0)]
    #[case::turned_left(-50.0, -45.0)]
    #[case::full_profile_clamped(150.0, 90.0)]
    fn test_yaw_from_nose_offset(#[case] dx: f64, #[case] expected: f64) {
        // outer corners 270/370: span 100, midpoint 320
        let s = compute(face(4.5, dx, 0.0));
        assert_relative_eq!(s.head_pose.yaw, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_pitch_looking_down() {
        // nose 20px lower: ratio 0.65, pitch = 2 * 0.1 * 90 = 18
        let s = compute(face(4.5, 0.0, 20.0));
        assert_relative_eq!(s.head_pose.pitch, 18.0, epsilon = 1e-9);
    }

    #[test]
    fn test_roll_from_tilted_eye_line() {
        let mut pts = face(4.5, 0.0, 0.0);
        pts.insert(263, Point::new(370.0, 300.0));
        let s = compute(pts);
        // (100, 100) from the left outer corner is 45 degrees
        assert_relative_eq!(s.head_pose.roll, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_eye_landmark_uses_default_ear() {
        let mut pts = face(4.5, 0.0, 0.0);
        pts.remove(&160);
        let s = compute(pts);
        assert_relative_eq!(s.eye_aspect_ratio.left, DEFAULT_EYE_ASPECT_RATIO);
        assert_relative_eq!(s.eye_aspect_ratio.right, 0.3, epsilon = 1e-9);
        assert!(!s.complete);
    }

    #[test]
    fn test_collapsed_eye_width_uses_default_ear() {
        let mut pts = face(4.5, 0.0, 0.0);
        pts.insert(133, Point::new(270.0, 200.0)); // inner corner == outer corner
        let s = compute(pts);
        assert_relative_eq!(s.eye_aspect_ratio.left, DEFAULT_EYE_ASPECT_RATIO);
    }

    #[test]
    fn test_missing_outer_corners_falls_back_to_cheeks_for_yaw() {
        let mut pts = face(4.5, 40.0, 0.0);
        pts.remove(&33);
        pts.remove(&263);
        let s = compute(pts);
        // cheeks 240/400: span 160, midpoint 320 -> 40/160 * 90
        assert_relative_eq!(s.head_pose.yaw, 22.5, epsilon = 1e-9);
        assert!(!s.complete); // roll needs the eye corners
    }

    #[test]
    fn test_no_keypoints_degrades_to_neutral() {
        let s = compute(BTreeMap::new());
        assert_relative_eq!(s.eye_aspect_ratio.left, DEFAULT_EYE_ASPECT_RATIO);
        assert_eq!(s.head_pose, HeadPose::default());
        assert_relative_eq!(s.face_size, 0.0);
        assert_relative_eq!(s.centering, 0.0);
        assert!(!s.complete);
    }

    #[test]
    fn test_all_points_collinear_stays_finite() {
        let pts: BTreeMap<usize, Point> = face(4.5, 0.0, 0.0)
            .into_keys()
            .map(|k| (k, Point::new(100.0, 100.0)))
            .collect();
        let s = compute(pts);
        assert!(s.eye_aspect_ratio.left.is_finite());
        assert!(s.head_pose.yaw.is_finite());
        assert!(s.head_pose.pitch.is_finite());
        assert!(s.centering.is_finite());
    }

    #[test]
    fn test_zero_sized_frame_reports_worst_centering() {
        let s = FeatureComputer::default().compute(
            &FaceDetection::new(0.9, face(4.5, 0.0, 0.0)),
            FrameSize::new(0, 0),
        );
        assert_relative_eq!(s.centering, 1.0);
    }

    #[test]
    fn test_gaze_from_iris_offset() {
        let mut pts = face(4.5, 0.0, 0.0);
        // eye centres at x=285 and x=355, half-width 15
        pts.insert(landmarks::LEFT_IRIS, Point::new(291.0, 200.0));
        pts.insert(landmarks::RIGHT_IRIS, Point::new(361.0, 200.0));
        let s = compute(pts);
        assert_relative_eq!(s.gaze.horizontal, 0.4, epsilon = 1e-9);
        assert_relative_eq!(s.gaze.vertical, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gaze_falls_back_to_head_pose() {
        let s = compute(face(4.5, 50.0, 0.0));
        assert_relative_eq!(s.gaze.horizontal, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_same_detection_yields_identical_snapshot() {
        let detection = FaceDetection::new(0.95, face(3.0, 12.5, -7.25));
        let computer = FeatureComputer::default();
        let a = computer.compute(&detection, FRAME);
        let b = computer.compute(&detection, FRAME);
        assert_eq!(a, b);
    }
}
