use std::path::Path;

use crate::detection::domain::face_detection::FaceDetection;
use crate::detection::domain::landmark_extractor::LandmarkExtractor;
use crate::detection::infrastructure::onnx_face_locator::{FaceBox, OnnxFaceLocator};
use crate::detection::infrastructure::onnx_session::{self, crop_to_tensor, InputSpec};
use crate::shared::frame::Frame;
use crate::shared::geometry::{sigmoid, Point};

const INPUT_SIZE: usize = 192;

/// Landmarks without iris refinement; 478 with.
const MIN_LANDMARKS: usize = 468;

/// Crop side length relative to the larger side of the located box.
const CROP_SCALE: f64 = 1.5;

/// Face-mesh landmark extractor.
///
/// A face locator picks the most confident face; the mesh model then runs on
/// a padded square crop around it and its landmarks are mapped back into
/// frame coordinates.
pub struct OnnxFaceMeshExtractor {
    locator: OnnxFaceLocator,
    session: ort::session::Session,
    input: InputSpec,
}

impl OnnxFaceMeshExtractor {
    pub fn new(locator: OnnxFaceLocator, mesh_model: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = onnx_session::load_session(mesh_model)?;
        let input = onnx_session::input_spec(&session, INPUT_SIZE);
        Ok(Self {
            locator,
            session,
            input,
        })
    }
}

impl LandmarkExtractor for OnnxFaceMeshExtractor {
    fn detect(&mut self, frame: &Frame) -> Result<FaceDetection, Box<dyn std::error::Error>> {
        let Some(face) = self.locator.locate(frame)? else {
            return Ok(FaceDetection::absent());
        };

        let crop = square_crop(&face, CROP_SCALE);
        let tensor = crop_to_tensor(frame, crop, self.input, (0.0, 1.0));
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        let mut landmarks: Option<Vec<f32>> = None;
        let mut presence: Option<f32> = None;
        for i in 0..outputs.len() {
            let array = outputs[i].try_extract_array::<f32>()?;
            let data: Vec<f32> = array.iter().copied().collect();
            if data.len() >= MIN_LANDMARKS * 3 && landmarks.is_none() {
                landmarks = Some(data);
            } else if data.len() == 1 && presence.is_none() {
                presence = Some(data[0]);
            }
        }
        let landmarks = landmarks.ok_or("face mesh model produced no landmark tensor")?;

        let confidence = presence.map_or(face.score, |logit| sigmoid(logit) as f64);
        Ok(FaceDetection::from_points(
            confidence,
            map_to_frame(&landmarks, crop, self.input.size),
        ))
    }
}

/// Square region centred on the face box, `scale` times its larger side.
fn square_crop(face: &FaceBox, scale: f64) -> [f64; 4] {
    let (cx, cy) = face.center();
    let half = face.width().max(face.height()) * scale / 2.0;
    [cx - half, cy - half, cx + half, cy + half]
}

/// Converts `(x, y, z)` triples in crop-input pixels into indexed frame points.
fn map_to_frame(raw: &[f32], crop: [f64; 4], input_size: usize) -> Vec<(usize, Point)> {
    let sx = (crop[2] - crop[0]) / input_size.max(1) as f64;
    let sy = (crop[3] - crop[1]) / input_size.max(1) as f64;
    raw.chunks_exact(3)
        .enumerate()
        .map(|(i, xyz)| {
            let x = crop[0] + xyz[0] as f64 * sx;
            let y = crop[1] + xyz[1] as f64 * sy;
            (i, Point::new(x, y))
        })
        .filter(|(_, p)| p.is_finite())
        .collect()
}
