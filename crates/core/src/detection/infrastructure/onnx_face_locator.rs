//! BlazeFace short-range face locator.
//!
//! Finds candidate face boxes so the landmark model can run on a tight crop.
//! Only the most confident box survives; the engine tracks one face.

use std::path::Path;

use crate::detection::infrastructure::onnx_session::{self, crop_to_tensor, InputSpec};
use crate::shared::frame::Frame;
use crate::shared::geometry::{bbox_iou, sigmoid};

const INPUT_SIZE: usize = 128;

/// Default minimum face score.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const NMS_IOU_THRESH: f64 = 0.3;

/// 16x16 grid x 2 anchors + 8x8 grid x 6 anchors.
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: box (4) + 6 keypoints (12).
const REGRESSOR_STRIDE: usize = 16;

/// A located face in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub bbox: [f64; 4],
    pub score: f64,
}

impl FaceBox {
    pub fn width(&self) -> f64 {
        self.bbox[2] - self.bbox[0]
    }

    pub fn height(&self) -> f64 {
        self.bbox[3] - self.bbox[1]
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.bbox[0] + self.bbox[2]) / 2.0,
            (self.bbox[1] + self.bbox[3]) / 2.0,
        )
    }
}

pub struct OnnxFaceLocator {
    session: ort::session::Session,
    input: InputSpec,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxFaceLocator {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = onnx_session::load_session(model_path)?;
        let input = onnx_session::input_spec(&session, INPUT_SIZE);
        Ok(Self {
            session,
            input,
            confidence,
            anchors: generate_anchors(),
        })
    }

    /// The most confident face in the frame, if any clears the threshold.
    pub fn locate(&mut self, frame: &Frame) -> Result<Option<FaceBox>, Box<dyn std::error::Error>> {
        let full = [0.0, 0.0, frame.width() as f64, frame.height() as f64];
        let tensor = crop_to_tensor(frame, full, self.input, (-1.0, 1.0));

        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors [1, 896, 16], classificators [1, 896, 1]
        if outputs.len() < 2 {
            return Err(format!("face locator expected 2 outputs, got {}", outputs.len()).into());
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let raw_scores = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut candidates = decode(
            reg,
            raw_scores,
            &self.anchors,
            self.confidence,
            self.input.size,
            (frame.width() as f64, frame.height() as f64),
        );
        Ok(nms(&mut candidates, NMS_IOU_THRESH).into_iter().next())
    }
}

fn decode(
    reg: &[f32],
    raw_scores: &[f32],
    anchors: &[[f32; 2]],
    confidence: f64,
    input_size: usize,
    (fw, fh): (f64, f64),
) -> Vec<FaceBox> {
    let scale = input_size as f32;
    let mut boxes = Vec::new();

    for (i, (&raw, anchor)) in raw_scores.iter().zip(anchors).enumerate() {
        let score = sigmoid(raw.clamp(-100.0, 100.0)) as f64;
        if score < confidence {
            continue;
        }
        let offset = i * REGRESSOR_STRIDE;
        let Some(r) = reg.get(offset..offset + 4) else {
            break;
        };

        let cx = (anchor[0] + r[0] / scale) as f64;
        let cy = (anchor[1] + r[1] / scale) as f64;
        let w = (r[2] / scale) as f64;
        let h = (r[3] / scale) as f64;

        let bbox = [
            ((cx - w / 2.0) * fw).max(0.0),
            ((cy - h / 2.0) * fh).max(0.0),
            ((cx + w / 2.0) * fw).min(fw),
            ((cy + h / 2.0) * fh).min(fh),
        ];
        if bbox[2] > bbox[0] && bbox[3] > bbox[1] {
            boxes.push(FaceBox { bbox, score });
        }
    }
    boxes
}

fn generate_anchors() -> Vec<[f32; 2]> {
    let layers = [(8, 2), (16, 6)]; // (stride, anchors per cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, per_cell) in &layers {
        let grid = INPUT_SIZE / stride;
        for y in 0..grid {
            for x in 0..grid {
                let cx = (x as f32 + 0.5) / grid as f32;
                let cy = (y as f32 + 0.5) / grid as f32;
                anchors.extend(std::iter::repeat([cx, cy]).take(per_cell));
            }
        }
    }
    anchors
}

/// Greedy non-maximum suppression, highest score first.
fn nms(boxes: &mut [FaceBox], iou_thresh: f64) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes.iter() {
        if keep
            .iter()
            .all(|kept| bbox_iou(&kept.bbox, &candidate.bbox) <= iou_thresh)
        {
            keep.push(*candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn face(bbox: [f64; 4], score: f64) -> FaceBox {
        FaceBox { bbox, score }
    }

    #[test]
    fn test_generate_anchors_count() {
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        assert!(generate_anchors()
            .iter()
            .all(|a| a[0] > 0.0 && a[0] < 1.0 && a[1] > 0.0 && a[1] < 1.0));
    }

    #[test]
    fn test_nms_keeps_most_confident_first() {
        let mut boxes = vec![
            face([0.0, 0.0, 100.0, 100.0], 0.7),
            face([5.0, 5.0, 105.0, 105.0], 0.9),
            face([300.0, 300.0, 350.0, 350.0], 0.6),
        ];
        let kept = nms(&mut boxes, 0.3);
        assert_eq!(kept.len(), 2);
        assert_relative_eq!(kept[0].score, 0.9);
        assert_relative_eq!(kept[1].score, 0.6);
    }

    #[test]
    fn test_decode_maps_anchor_box_to_frame() {
        let anchors = vec![[0.5f32, 0.5f32]];
        let mut reg = vec![0.0f32; REGRESSOR_STRIDE];
        // 64x64 box in the 128 input -> half the frame in each axis
        reg[2] = 64.0;
        reg[3] = 64.0;
        let boxes = decode(&reg, &[5.0], &anchors, 0.5, 128, (640.0, 480.0));
        assert_eq!(boxes.len(), 1);
        let b = boxes[0];
        assert_relative_eq!(b.bbox[0], 160.0, epsilon = 1e-3);
        assert_relative_eq!(b.bbox[3], 360.0, epsilon = 1e-3);
        assert_relative_eq!(b.width(), 320.0, epsilon = 1e-3);
        assert_eq!(b.center(), (320.0, 240.0));
    }

    #[test]
    fn test_decode_filters_low_scores_and_empty_boxes() {
        let anchors = vec![[0.5f32, 0.5f32], [0.25, 0.25]];
        let mut reg = vec![0.0f32; 2 * REGRESSOR_STRIDE];
        reg[2] = 32.0;
        reg[3] = 32.0;
        // first anchor scores below threshold, second has a zero-size box
        let boxes = decode(&reg, &[-5.0, 5.0], &anchors, 0.5, 128, (640.0, 480.0));
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_decode_tolerates_short_regressor_output() {
        let anchors = vec![[0.5f32, 0.5f32]; 3];
        let boxes = decode(&[0.0; 4], &[5.0, 5.0, 5.0], &anchors, 0.5, 128, (10.0, 10.0));
        assert!(boxes.is_empty());
    }
}
