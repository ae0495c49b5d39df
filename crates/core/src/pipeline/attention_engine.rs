use crate::detection::domain::face_detection::FaceDetection;
use crate::features::domain::feature_computer::FeatureComputer;
use crate::pipeline::session_config::TrackerConfig;
use crate::reporting::domain::session_reporter::FeatureBundle;
use crate::scoring::domain::attention_report::{AttentionReport, ScoringBranch};
use crate::scoring::domain::score_smoother::ScoreSmoother;
use crate::scoring::domain::scoring_engine::{Observation, ScoringEngine};
use crate::shared::frame::FrameSize;
use crate::tracking::domain::temporal_tracker::{TemporalSignals, TemporalTracker};

/// Everything one scoring cycle produced.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineOutput {
    pub report: AttentionReport,
    pub branch: ScoringBranch,
    /// Snapshot for the periodic reporter.
    pub bundle: FeatureBundle,
    /// Signals the tracker derived this cycle; default when no face was seen.
    pub signals: TemporalSignals,
}

/// Synchronous detection-to-score core: features, temporal tracking,
/// discrete scoring and smoothing for one session.
///
/// Holds the session's `TemporalState`; call [`reset`](Self::reset) between
/// sessions.
pub struct AttentionEngine {
    features: FeatureComputer,
    tracker: TemporalTracker,
    scoring: ScoringEngine,
    smoother: ScoreSmoother,
}

impl AttentionEngine {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            features: FeatureComputer::new(config.features.clone()),
            tracker: TemporalTracker::new(config.tracking.clone()),
            scoring: ScoringEngine::new(config.scoring.clone()),
            smoother: ScoreSmoother::new(config.scoring.smoothing_window),
        }
    }

    pub fn tracker(&self) -> &TemporalTracker {
        &self.tracker
    }

    pub fn process(&mut self, detection: &FaceDetection, frame: FrameSize, timestamp_ms: u64) -> EngineOutput {
        if !detection.is_present() {
            self.tracker.face_lost();
            self.tracker.state_mut().attention_score_history.clear();
            let decision = self.scoring.evaluate(Observation::NoFace);
            let report = AttentionReport::no_face(timestamp_ms);
            return EngineOutput {
                bundle: FeatureBundle::no_face(&report),
                report,
                branch: decision.branch,
                signals: TemporalSignals::default(),
            };
        }

        let snapshot = self.features.compute(detection, frame);
        let signals = self.tracker.update(&snapshot, timestamp_ms);
        let decision = self.scoring.evaluate(Observation::Face {
            snapshot: &snapshot,
            confidence: detection.confidence(),
            signals: &signals,
        });

        let history = &mut self.tracker.state_mut().attention_score_history;
        let score = match decision.branch {
            ScoringBranch::EyesClosed => {
                history.push(decision.score);
                decision.score
            }
            _ => self.smoother.smooth(history, decision.score),
        };

        let report = AttentionReport {
            score,
            face_detected: true,
            looking_at_screen: decision.looking_at_screen,
            timestamp_ms,
        };
        log::debug!(
            "score {score} ({}) yaw {:.1} pitch {:.1} ear {:.3}",
            decision.branch,
            snapshot.head_pose.yaw,
            snapshot.head_pose.pitch,
            snapshot.eye_aspect_ratio.average()
        );
        EngineOutput {
            bundle: FeatureBundle::from_face(&snapshot, &signals, &report),
            report,
            branch: decision.branch,
            signals,
        }
    }

    /// Drops all temporal state.
    pub fn reset(&mut self) {
        self.tracker.reset();
    }
}
