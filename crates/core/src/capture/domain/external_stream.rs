use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::capture::domain::capture_device::CaptureError;
use crate::shared::frame::Frame;

/// Frames supplied by the host, e.g. decoded from a conferencing session.
///
/// The host keeps the sending side and any number of receiver clones. Dropping
/// an `ExternalStream` only drops this handle; the stream itself stays alive
/// for every other holder.
#[derive(Clone, Debug)]
pub struct ExternalStream {
    rx: Receiver<Frame>,
}

impl ExternalStream {
    pub fn new(rx: Receiver<Frame>) -> Self {
        Self { rx }
    }

    /// A bounded stream and the sender that feeds it.
    pub fn channel(capacity: usize) -> (Sender<Frame>, Self) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (tx, Self::new(rx))
    }

    /// `Ok(None)` once every sender has hung up.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Frame>, CaptureError> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::FrameTimeout),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0; 12], 2, 2, 3, index, index as u64)
    }

    #[test]
    fn test_receives_in_order() {
        let (tx, stream) = ExternalStream::channel(4);
        tx.send(frame(0)).unwrap();
        tx.send(frame(1)).unwrap();
        let timeout = Duration::from_millis(10);
        assert_eq!(stream.recv_timeout(timeout).unwrap().unwrap().index(), 0);
        assert_eq!(stream.recv_timeout(timeout).unwrap().unwrap().index(), 1);
    }

    #[test]
    fn test_empty_stream_times_out() {
        let (_tx, stream) = ExternalStream::channel(1);
        assert!(matches!(
            stream.recv_timeout(Duration::from_millis(5)),
            Err(CaptureError::FrameTimeout)
        ));
    }

    #[test]
    fn test_hung_up_sender_ends_stream() {
        let (tx, stream) = ExternalStream::channel(1);
        drop(tx);
        assert!(stream.recv_timeout(Duration::from_millis(5)).unwrap().is_none());
    }

    #[test]
    fn test_dropping_a_clone_keeps_stream_alive() {
        let (tx, stream) = ExternalStream::channel(2);
        let clone = stream.clone();
        drop(clone);
        assert!(tx.send(frame(3)).is_ok());
        assert!(stream.recv_timeout(Duration::from_millis(5)).unwrap().is_some());
    }
}
