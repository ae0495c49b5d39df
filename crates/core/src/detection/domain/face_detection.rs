use std::collections::BTreeMap;

use crate::shared::geometry::Point;

/// Face-mesh landmark indices consumed by feature extraction.
///
/// "Left" and "right" refer to the side of the image, not the subject.
pub mod landmarks {
    /// Eye contour in EAR order p1..p6: outer corner, two upper lid points,
    /// inner corner, two lower lid points (p2/p6 and p3/p5 are vertical pairs).
    pub const LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];
    pub const RIGHT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];

    pub const LEFT_EYE_OUTER: usize = 33;
    pub const RIGHT_EYE_OUTER: usize = 263;
    pub const NOSE_TIP: usize = 1;
    pub const FOREHEAD: usize = 10;
    pub const CHIN: usize = 152;
    pub const LEFT_CHEEK: usize = 234;
    pub const RIGHT_CHEEK: usize = 454;

    /// Only present when the mesh model refines irises (478 points).
    pub const LEFT_IRIS: usize = 468;
    pub const RIGHT_IRIS: usize = 473;
}

/// Result of running the landmark extractor on one frame.
///
/// At most one face is reported. No identity carries over between frames.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceDetection {
    present: bool,
    confidence: f64,
    keypoints: BTreeMap<usize, Point>,
}

impl FaceDetection {
    pub fn new(confidence: f64, keypoints: BTreeMap<usize, Point>) -> Self {
        Self {
            present: true,
            confidence,
            keypoints,
        }
    }

    /// No face in the frame.
    pub fn absent() -> Self {
        Self {
            present: false,
            confidence: 0.0,
            keypoints: BTreeMap::new(),
        }
    }

    pub fn from_points(confidence: f64, points: impl IntoIterator<Item = (usize, Point)>) -> Self {
        Self::new(confidence, points.into_iter().collect())
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn keypoints(&self) -> &BTreeMap<usize, Point> {
        &self.keypoints
    }

    /// Landmark by index, skipping non-finite coordinates.
    pub fn keypoint(&self, index: usize) -> Option<Point> {
        self.keypoints.get(&index).copied().filter(Point::is_finite)
    }
}
