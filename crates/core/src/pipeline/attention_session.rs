use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::capture::domain::capture_device::CaptureError;
use crate::capture::domain::external_stream::ExternalStream;
use crate::capture::domain::frame_source_adapter::FrameSourceAdapter;
use crate::detection::domain::face_detection::FaceDetection;
use crate::detection::domain::landmark_extractor::LandmarkExtractor;
use crate::detection::domain::model_gate::{GateOutcome, ModelGate, ModelLoadError};
use crate::pipeline::attention_engine::AttentionEngine;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::pipeline::session_config::TrackerConfig;
use crate::reporting::domain::session_reporter::{ReportError, SessionReporter};
use crate::reporting::infrastructure::periodic_reporter::PeriodicReporter;
use crate::scoring::domain::attention_report::AttentionReport;

/// How often a pending model load re-checks the stop flag.
const MODEL_POLL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error("session was stopped before it became active")]
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// No scores are emitted. `reason` says why (never started, stopped,
    /// device or model failure, end of stream).
    Inactive { reason: String },
    WaitingForModel,
    Active,
}

/// Result of a single [`AttentionSession::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Report(AttentionReport),
    /// No frame arrived within the frame timeout.
    Idle,
    EndOfStream,
    /// The session is not active (or was stopped during the cycle).
    Stopped,
}

/// Cloneable cross-thread stop request for a running session.
#[derive(Clone, Debug)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub type ReportCallback = Box<dyn FnMut(&AttentionReport) + Send>;
pub type ReporterFactory = Box<dyn FnMut() -> Result<Box<dyn SessionReporter>, ReportError> + Send>;

/// One tracking session: frame source, landmark model, scoring engine and
/// the optional periodic reporter, driven one cycle at a time.
///
/// A cycle is only requested after the previous one finished, so a slow
/// extractor throttles the frame rate instead of queueing work.
pub struct AttentionSession {
    adapter: FrameSourceAdapter,
    gate: Option<ModelGate>,
    extractor: Option<Box<dyn LandmarkExtractor>>,
    engine: AttentionEngine,
    reporter_factory: Option<ReporterFactory>,
    report_interval: Duration,
    reporter: Option<PeriodicReporter>,
    on_report: Option<ReportCallback>,
    logger: Box<dyn PipelineLogger>,
    stop_flag: Arc<AtomicBool>,
    status: SessionStatus,
}

impl AttentionSession {
    pub fn new(adapter: FrameSourceAdapter, gate: ModelGate, config: &TrackerConfig) -> Self {
        let report_interval = config
            .reporter
            .as_ref()
            .map_or(Duration::ZERO, |r| Duration::from_millis(r.interval_ms));
        Self {
            adapter,
            gate: Some(gate),
            extractor: None,
            engine: AttentionEngine::new(config),
            reporter_factory: None,
            report_interval,
            reporter: None,
            on_report: None,
            logger: Box::new(NullPipelineLogger),
            stop_flag: Arc::new(AtomicBool::new(false)),
            status: SessionStatus::Inactive {
                reason: "not started".into(),
            },
        }
    }

    pub fn with_callback(mut self, on_report: ReportCallback) -> Self {
        self.on_report = Some(on_report);
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Enables periodic reporting. A fresh reporter is built on every start.
    pub fn with_reporter(mut self, factory: ReporterFactory, interval: Duration) -> Self {
        self.reporter_factory = Some(factory);
        self.report_interval = interval;
        self
    }

    /// Supplies a new model load, e.g. to retry after a failed one.
    pub fn replace_model_gate(&mut self, gate: ModelGate) {
        self.extractor = None;
        self.gate = Some(gate);
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: self.stop_flag.clone(),
        }
    }

    /// Attaches the frame source and waits for the landmark model.
    ///
    /// Device and model failures leave the session inactive and are returned
    /// to the caller. A stop requested while the model is loading cancels the
    /// start and releases the device again.
    pub fn start(&mut self, external: Option<ExternalStream>) -> Result<(), SessionError> {
        if self.is_live() {
            self.stop();
        }
        self.stop_flag.store(false, Ordering::SeqCst);

        if let Err(e) = self.adapter.start(external) {
            log::warn!("Tracking inactive: {e}");
            self.deactivate(e.to_string());
            return Err(e.into());
        }

        if self.extractor.is_none() {
            self.status = SessionStatus::WaitingForModel;
            self.logger.info("Waiting for landmark model");
            let Some(gate) = self.gate.as_mut() else {
                self.adapter.stop();
                self.deactivate(ModelLoadError::Disconnected.to_string());
                return Err(ModelLoadError::Disconnected.into());
            };
            match gate.wait(&self.stop_flag, MODEL_POLL) {
                GateOutcome::Ready(extractor) => {
                    self.extractor = Some(extractor);
                    self.gate = None;
                }
                GateOutcome::Cancelled => {
                    self.adapter.stop();
                    self.deactivate("stopped while loading the landmark model".into());
                    return Err(SessionError::Cancelled);
                }
                GateOutcome::Failed(e) => {
                    log::warn!("Tracking inactive: {e}");
                    self.gate = None;
                    self.adapter.stop();
                    self.deactivate(e.to_string());
                    return Err(e.into());
                }
            }
        }

        // The caller may have stopped tracking while we were waiting.
        if self.stop_flag.load(Ordering::SeqCst) {
            self.adapter.stop();
            self.deactivate("stopped during start".into());
            return Err(SessionError::Cancelled);
        }

        self.engine.reset();
        self.reporter = self.spawn_reporter();
        self.status = SessionStatus::Active;
        self.logger.info("Attention tracking active");
        Ok(())
    }

    /// Runs one detection and scoring cycle.
    pub fn step(&mut self) -> Result<StepOutcome, SessionError> {
        if !self.is_active() {
            return Ok(StepOutcome::Stopped);
        }
        if self.stop_flag.load(Ordering::SeqCst) {
            self.stop();
            return Ok(StepOutcome::Stopped);
        }

        let frame = match self.adapter.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.logger.info("Frame source ended");
                self.stop();
                self.deactivate("end of stream".into());
                return Ok(StepOutcome::EndOfStream);
            }
            Err(CaptureError::FrameTimeout) => return Ok(StepOutcome::Idle),
            Err(e) => {
                log::warn!("Frame source failed: {e}");
                self.stop();
                self.deactivate(e.to_string());
                return Err(e.into());
            }
        };

        let Some(extractor) = self.extractor.as_mut() else {
            return Ok(StepOutcome::Stopped);
        };
        let t0 = Instant::now();
        let detection = extractor.detect(&frame).unwrap_or_else(|e| {
            log::warn!("Landmark detection failed on frame {}: {e}", frame.index());
            FaceDetection::absent()
        });
        self.logger.timing("detect", t0.elapsed().as_secs_f64() * 1000.0);

        if self.stop_flag.load(Ordering::SeqCst) {
            self.stop();
            return Ok(StepOutcome::Stopped);
        }

        let t0 = Instant::now();
        let output = self
            .engine
            .process(&detection, frame.size(), frame.timestamp_ms());
        self.logger.timing("score", t0.elapsed().as_secs_f64() * 1000.0);

        if output.report.face_detected {
            self.logger.metric("blink_rate", output.signals.blink_rate_per_min);
            self.logger.metric("movement_stability", output.signals.movement_stability);
        }
        self.logger.frame_scored(&output.report, output.branch);

        if let Some(callback) = self.on_report.as_mut() {
            callback(&output.report);
        }
        if let Some(reporter) = &self.reporter {
            if !reporter.publish(Some(frame), output.bundle) {
                log::debug!("Report mailbox busy; snapshot skipped");
            }
        }
        Ok(StepOutcome::Report(output.report))
    }

    /// Cycles until stopped or the stream ends. Returns the number of
    /// reports emitted.
    pub fn run(&mut self) -> Result<usize, SessionError> {
        let mut reports = 0;
        let result = loop {
            match self.step() {
                Ok(StepOutcome::Report(_)) => reports += 1,
                Ok(StepOutcome::Idle) => continue,
                Ok(StepOutcome::EndOfStream | StepOutcome::Stopped) => break Ok(reports),
                Err(e) => break Err(e),
            }
        };
        self.logger.summary();
        result
    }

    /// Stops cycling, releases an owned device, cancels the reporter and drops
    /// temporal state. Safe to call any number of times.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.adapter.stop();
        if let Some(mut reporter) = self.reporter.take() {
            reporter.cancel();
            log::info!(
                "Periodic reporter stopped ({} sent, {} failed)",
                reporter.reports_sent(),
                reporter.reports_failed()
            );
        }
        self.engine.reset();
        if self.is_live() {
            self.deactivate("stopped".into());
        }
    }

    fn is_live(&self) -> bool {
        matches!(self.status, SessionStatus::Active | SessionStatus::WaitingForModel)
    }

    fn deactivate(&mut self, reason: String) {
        self.status = SessionStatus::Inactive { reason };
    }

    fn spawn_reporter(&mut self) -> Option<PeriodicReporter> {
        let factory = self.reporter_factory.as_mut()?;
        match factory() {
            Ok(reporter) => Some(PeriodicReporter::spawn(reporter, self.report_interval)),
            Err(e) => {
                log::warn!("Periodic reporting disabled: {e}");
                None
            }
        }
    }
}

impl Drop for AttentionSession {
    fn drop(&mut self) {
        self.stop();
    }
}
