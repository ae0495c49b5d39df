use crate::detection::domain::face_detection::FaceDetection;
use crate::shared::frame::Frame;

/// Domain interface for facial landmark extraction.
///
/// Returns at most one face per frame; when several faces are visible the
/// implementation reports the most confident one. Implementations may keep
/// inference sessions or scratch buffers, hence `&mut self`.
pub trait LandmarkExtractor: Send {
    fn detect(&mut self, frame: &Frame) -> Result<FaceDetection, Box<dyn std::error::Error>>;
}
