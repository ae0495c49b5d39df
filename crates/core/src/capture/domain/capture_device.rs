use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture device '{device}' unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },
    #[error("frame source not started")]
    NotStarted,
    #[error("no frame arrived within the timeout")]
    FrameTimeout,
    #[error("failed to read frame: {0}")]
    Decode(String),
}

/// A local capture device that yields frames until it is closed.
///
/// `read_frame` returns `Ok(None)` once the source is exhausted (a replayed
/// file ends, a camera is unplugged).
pub trait CaptureDevice: Send {
    fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Stops the hardware capture. Must be safe to call more than once.
    fn close(&mut self);
}

/// Opens capture devices by identifier (device path, index, or file).
pub trait DeviceOpener: Send + Sync {
    fn open(&self, device: &str) -> Result<Box<dyn CaptureDevice>, Box<dyn std::error::Error>>;
}
