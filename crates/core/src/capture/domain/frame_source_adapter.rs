use std::sync::Arc;
use std::time::Duration;

use crate::capture::domain::capture_device::CaptureError;
use crate::capture::domain::device_manager::{DeviceLease, DeviceManager};
use crate::capture::domain::external_stream::ExternalStream;
use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Local,
    External,
}

enum ActiveSource {
    Local(DeviceLease),
    External(ExternalStream),
}

/// Supplies frames from either a host-provided stream or a local camera.
///
/// An external stream always wins when one is supplied. Local devices are
/// leased from the shared [`DeviceManager`] and released on `stop`; external
/// streams are only detached, never terminated.
pub struct FrameSourceAdapter {
    manager: Arc<DeviceManager>,
    device_id: String,
    frame_timeout: Duration,
    active: Option<ActiveSource>,
}

impl FrameSourceAdapter {
    pub fn new(manager: Arc<DeviceManager>, device_id: impl Into<String>, frame_timeout: Duration) -> Self {
        Self {
            manager,
            device_id: device_id.into(),
            frame_timeout,
            active: None,
        }
    }

    pub fn start(&mut self, external: Option<ExternalStream>) -> Result<SourceKind, CaptureError> {
        if self.active.is_some() {
            log::debug!("Frame source restarted while active; releasing previous source");
            self.stop();
        }

        let (source, kind) = match external {
            Some(stream) => (ActiveSource::External(stream), SourceKind::External),
            None => (
                ActiveSource::Local(self.manager.acquire(&self.device_id)?),
                SourceKind::Local,
            ),
        };
        log::info!("Frame source started ({kind:?})");
        self.active = Some(source);
        Ok(kind)
    }

    /// Idempotent.
    pub fn stop(&mut self) {
        match self.active.take() {
            Some(ActiveSource::Local(mut lease)) => {
                lease.release();
                log::info!("Released capture device '{}'", lease.device_id());
            }
            Some(ActiveSource::External(_)) => log::info!("Detached from external stream"),
            None => {}
        }
    }

    /// `Ok(None)` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        match &self.active {
            Some(ActiveSource::Local(lease)) => lease.read_frame(),
            Some(ActiveSource::External(stream)) => stream.recv_timeout(self.frame_timeout),
            None => Err(CaptureError::NotStarted),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        self.active.as_ref().map(|s| match s {
            ActiveSource::Local(_) => SourceKind::Local,
            ActiveSource::External(_) => SourceKind::External,
        })
    }
}

impl Drop for FrameSourceAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}
