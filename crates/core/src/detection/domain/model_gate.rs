use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use thiserror::Error;

use crate::detection::domain::landmark_extractor::LandmarkExtractor;

type SendError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelLoadError {
    #[error("landmark model failed to load: {0}")]
    Failed(String),
    #[error("landmark model loader exited without a result")]
    Disconnected,
}

pub enum GateOutcome {
    Ready(Box<dyn LandmarkExtractor>),
    /// The caller stopped tracking while the model was still loading.
    Cancelled,
    Failed(ModelLoadError),
}

/// Readiness gate for a landmark model that loads on a background thread.
///
/// Detection must not start before the gate yields `Ready`. `wait` polls the
/// cancellation flag so a stop issued during a slow load is honoured, and a
/// cancelled wait can be resumed later since the load keeps running.
pub struct ModelGate {
    rx: Receiver<Result<Box<dyn LandmarkExtractor>, String>>,
}

impl ModelGate {
    /// Start loading on a dedicated thread.
    pub fn spawn<F>(build: F) -> Self
    where
        F: FnOnce() -> Result<Box<dyn LandmarkExtractor>, SendError> + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let result = build().map_err(|e| e.to_string());
            if let Err(ref e) = result {
                log::error!("Landmark model load failed: {e}");
            }
            let _ = tx.send(result);
        });
        Self { rx }
    }

    /// A gate that is already open.
    pub fn ready(extractor: Box<dyn LandmarkExtractor>) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let _ = tx.send(Ok(extractor));
        Self { rx }
    }

    /// Block until the model is ready, loading failed, or `cancelled` is set.
    pub fn wait(&mut self, cancelled: &AtomicBool, poll: Duration) -> GateOutcome {
        loop {
            if cancelled.load(Ordering::Relaxed) {
                return GateOutcome::Cancelled;
            }
            match self.rx.recv_timeout(poll) {
                Ok(Ok(extractor)) => return GateOutcome::Ready(extractor),
                Ok(Err(message)) => return GateOutcome::Failed(ModelLoadError::Failed(message)),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return GateOutcome::Failed(ModelLoadError::Disconnected)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_detection::FaceDetection;
    use crate::shared::frame::Frame;
    use std::sync::Arc;

    struct NoFaceExtractor;

    impl LandmarkExtractor for NoFaceExtractor {
        fn detect(&mut self, _frame: &Frame) -> Result<FaceDetection, Box<dyn std::error::Error>> {
            Ok(FaceDetection::absent())
        }
    }

    const POLL: Duration = Duration::from_millis(5);

    #[test]
    fn test_ready_gate_opens_immediately() {
        let mut gate = ModelGate::ready(Box::new(NoFaceExtractor));
        let flag = AtomicBool::new(false);
        assert!(matches!(gate.wait(&flag, POLL), GateOutcome::Ready(_)));
    }

    #[test]
    fn test_spawned_load_becomes_ready() {
        let mut gate = ModelGate::spawn(|| {
            std::thread::sleep(Duration::from_millis(20));
            Ok(Box::new(NoFaceExtractor) as Box<dyn LandmarkExtractor>)
        });
        let flag = AtomicBool::new(false);
        assert!(matches!(gate.wait(&flag, POLL), GateOutcome::Ready(_)));
    }

    #[test]
    fn test_failed_load_reports_message() {
        let mut gate = ModelGate::spawn(|| Err("missing weights".into()));
        let flag = AtomicBool::new(false);
        match gate.wait(&flag, POLL) {
            GateOutcome::Failed(ModelLoadError::Failed(msg)) => assert!(msg.contains("missing weights")),
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn test_cancel_during_load_then_resume() {
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        let mut gate = ModelGate::spawn(move || {
            let _ = release_rx.recv();
            Ok(Box::new(NoFaceExtractor) as Box<dyn LandmarkExtractor>)
        });

        let cancelled = Arc::new(AtomicBool::new(true));
        assert!(matches!(gate.wait(&cancelled, POLL), GateOutcome::Cancelled));

        release_tx.send(()).unwrap();
        cancelled.store(false, Ordering::Relaxed);
        assert!(matches!(gate.wait(&cancelled, POLL), GateOutcome::Ready(_)));
    }

    #[test]
    fn test_second_wait_after_ready_is_disconnected() {
        let mut gate = ModelGate::ready(Box::new(NoFaceExtractor));
        let flag = AtomicBool::new(false);
        let _ = gate.wait(&flag, POLL);
        assert!(matches!(
            gate.wait(&flag, POLL),
            GateOutcome::Failed(ModelLoadError::Disconnected)
        ));
    }
}
