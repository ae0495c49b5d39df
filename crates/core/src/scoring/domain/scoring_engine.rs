//! Discrete attention scoring.
//!
//! Rules are evaluated in a fixed priority order and the first match wins:
//!
//! 1. no face: 0
//! 2. eyes closed for the sustained-closure duration: closed-eyes score
//! 3. head shaking: shaking score
//! 4. head nodding: nodding score
//! 5. ideal pose (straight, centered, eyes open, confident): ideal score,
//!    the only branch that reports `looking_at_screen`
//! 6. anything else: partial score

use serde::{Deserialize, Serialize};

use crate::features::domain::feature_snapshot::FeatureSnapshot;
use crate::scoring::domain::attention_report::ScoringBranch;
use crate::tracking::domain::temporal_tracker::TemporalSignals;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdealPoseThresholds {
    pub max_abs_yaw_deg: f64,
    pub max_abs_pitch_deg: f64,
    pub max_abs_roll_deg: f64,
    pub max_centering: f64,
    /// Both eyes must be at least this open.
    pub min_eye_aspect_ratio: f64,
    pub min_confidence: f64,
}

impl Default for IdealPoseThresholds {
    fn default() -> Self {
        Self {
            max_abs_yaw_deg: 15.0,
            max_abs_pitch_deg: 15.0,
            max_abs_roll_deg: 15.0,
            max_centering: 0.35,
            min_eye_aspect_ratio: 0.2,
            min_confidence: 0.8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub closed_eyes_score: u8,
    pub shaking_score: u8,
    pub nodding_score: u8,
    pub ideal_score: u8,
    pub partial_score: u8,
    pub ideal: IdealPoseThresholds,
    /// Trailing moving-average window applied to the raw score; 1 disables smoothing.
    pub smoothing_window: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            closed_eyes_score: 10,
            shaking_score: 50,
            nodding_score: 30,
            ideal_score: 100,
            partial_score: 70,
            ideal: IdealPoseThresholds::default(),
            smoothing_window: 1,
        }
    }
}

/// Inputs for one scoring cycle.
#[derive(Clone, Copy, Debug)]
pub enum Observation<'a> {
    NoFace,
    Face {
        snapshot: &'a FeatureSnapshot,
        confidence: f64,
        signals: &'a TemporalSignals,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreDecision {
    pub score: u8,
    pub looking_at_screen: bool,
    pub branch: ScoringBranch,
}

#[derive(Clone, Debug, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn evaluate(&self, observation: Observation<'_>) -> ScoreDecision {
        let cfg = &self.config;
        let (snapshot, confidence, signals) = match observation {
            Observation::NoFace => return decision(0, ScoringBranch::NoFace),
            Observation::Face {
                snapshot,
                confidence,
                signals,
            } => (snapshot, confidence, signals),
        };

        if signals.sustained_closure {
            return decision(cfg.closed_eyes_score, ScoringBranch::EyesClosed);
        }
        if signals.shaking {
            return decision(cfg.shaking_score, ScoringBranch::Shaking);
        }
        if signals.nodding {
            return decision(cfg.nodding_score, ScoringBranch::Nodding);
        }
        if self.is_ideal(snapshot, confidence) {
            return ScoreDecision {
                score: cfg.ideal_score.min(100),
                looking_at_screen: true,
                branch: ScoringBranch::Ideal,
            };
        }
        decision(cfg.partial_score, ScoringBranch::Partial)
    }

    /// Every sub-threshold must hold at once. NaN inputs fail each comparison.
    pub fn is_ideal(&self, snapshot: &FeatureSnapshot, confidence: f64) -> bool {
        let t = &self.config.ideal;
        let pose = &snapshot.head_pose;
        snapshot.complete
            && pose.yaw.abs() <= t.max_abs_yaw_deg
            && pose.pitch.abs() <= t.max_abs_pitch_deg
            && pose.roll.abs() <= t.max_abs_roll_deg
            && snapshot.centering <= t.max_centering
            && snapshot.eye_aspect_ratio.min() >= t.min_eye_aspect_ratio
            && confidence >= t.min_confidence
    }
}

fn decision(score: u8, branch: ScoringBranch) -> ScoreDecision {
    ScoreDecision {
        score: score.min(100),
        looking_at_screen: false,
        branch,
    }
}
