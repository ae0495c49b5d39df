#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use attention_core::capture::domain::capture_device::{CaptureDevice, DeviceOpener};
use attention_core::detection::domain::face_detection::FaceDetection;
use attention_core::shared::frame::{Frame, FrameSize};
use attention_core::shared::geometry::Point;

pub const FRAME: FrameSize = FrameSize {
    width: 640,
    height: 480,
};

/// Eye half-opening giving EAR 0.3.
pub const OPEN_LID: f64 = 4.5;
/// Eye half-opening giving EAR 0.1.
pub const CLOSED_LID: f64 = 1.5;

/// Nose shift (px) that reads as `yaw_deg` of head yaw.
pub fn nose_dx_for_yaw(yaw_deg: f64) -> f64 {
    yaw_deg / 90.0 * 100.0
}

/// Synthetic frontal face centred in a 640x480 frame.
///
/// `lid` is the half-opening of each eye (EAR = lid / 15); `dx`/`dy` move the
/// nose tip, turning the head (100 px of `dx` is 90 degrees of yaw).
pub fn face(lid: f64, dx: f64, dy: f64, confidence: f64) -> FaceDetection {
    let mut points = vec![
        (33, Point::new(270.0, 200.0)),
        (133, Point::new(300.0, 200.0)),
        (362, Point::new(340.0, 200.0)),
        (263, Point::new(370.0, 200.0)),
        (1, Point::new(320.0 + dx, 260.0 + dy)),
        (10, Point::new(320.0, 150.0)),
        (152, Point::new(320.0, 350.0)),
        (234, Point::new(240.0, 240.0)),
        (454, Point::new(400.0, 240.0)),
    ];
    for (upper, lower, x) in [
        (160, 144, 280.0),
        (158, 153, 290.0),
        (385, 380, 350.0),
        (387, 373, 360.0),
    ] {
        points.push((upper, Point::new(x, 200.0 - lid)));
        points.push((lower, Point::new(x, 200.0 + lid)));
    }
    FaceDetection::from_points(confidence, points)
}

pub fn attentive_face() -> FaceDetection {
    face(OPEN_LID, 0.0, 0.0, 0.95)
}

pub fn blank_frame(index: usize, timestamp_ms: u64) -> Frame {
    Frame::new(vec![0; 4 * 4 * 3], 4, 4, 3, index, timestamp_ms)
}

/// Opener whose devices emit blank frames forever and count open/close calls.
#[derive(Clone, Default)]
pub struct FakeCameraOpener {
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

struct FakeCamera {
    closed: Arc<AtomicUsize>,
    next_index: usize,
    is_closed: bool,
}

impl CaptureDevice for FakeCamera {
    fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if self.is_closed {
            return Ok(None);
        }
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(blank_frame(index, index as u64 * 33)))
    }

    fn close(&mut self) {
        if !self.is_closed {
            self.is_closed = true;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl DeviceOpener for FakeCameraOpener {
    fn open(&self, _device: &str) -> Result<Box<dyn CaptureDevice>, Box<dyn std::error::Error>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeCamera {
            closed: self.closed.clone(),
            next_index: 0,
            is_closed: false,
        }))
    }
}
