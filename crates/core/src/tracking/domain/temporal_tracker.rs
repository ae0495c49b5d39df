//! Turns a stream of per-frame snapshots into conditions a single frame
//! cannot reveal: blinks, prolonged eye closure, head shaking and nodding.

use serde::{Deserialize, Serialize};

use crate::features::domain::feature_snapshot::FeatureSnapshot;
use crate::shared::constants::{
    ANGLE_HISTORY_CAPACITY, BLINK_DEBOUNCE_MS, BLINK_HISTORY_CAPACITY, BLINK_RATE_WINDOW_MS,
    CLOSED_EYE_THRESHOLD, MIN_DIRECTION_CHANGES, MIN_OSCILLATION_SWING_DEG,
    NOD_MIN_MAGNITUDE_DEG, POSITION_HISTORY_CAPACITY, SHAKE_MIN_MAGNITUDE_DEG, SUSTAINED_CLOSURE_MS,
};
use crate::shared::geometry::safe_ratio;
use crate::tracking::domain::oscillation::{self, OscillationStats};
use crate::tracking::domain::temporal_state::{AngleSample, PositionSample, TemporalState};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub closed_eye_threshold: f64,
    pub blink_debounce_ms: u64,
    pub sustained_closure_ms: u64,
    pub blink_rate_window_ms: u64,
    pub position_history_capacity: usize,
    pub angle_history_capacity: usize,
    pub blink_history_capacity: usize,
    pub score_history_capacity: usize,
    /// Number of most recent angle samples inspected for oscillation.
    pub oscillation_window: usize,
    pub min_direction_changes: usize,
    /// Smallest frame-to-frame angle step, in degrees, that can count as a
    /// reversal.
    pub min_swing_deg: f64,
    pub shake_min_magnitude_deg: f64,
    pub nod_min_magnitude_deg: f64,
    /// Mean frame-to-frame displacement, as a fraction of face size, at which
    /// movement stability reaches zero.
    pub movement_tolerance: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            closed_eye_threshold: CLOSED_EYE_THRESHOLD,
            blink_debounce_ms: BLINK_DEBOUNCE_MS,
            sustained_closure_ms: SUSTAINED_CLOSURE_MS,
            blink_rate_window_ms: BLINK_RATE_WINDOW_MS,
            position_history_capacity: POSITION_HISTORY_CAPACITY,
            angle_history_capacity: ANGLE_HISTORY_CAPACITY,
            blink_history_capacity: BLINK_HISTORY_CAPACITY,
            score_history_capacity: 10,
            oscillation_window: ANGLE_HISTORY_CAPACITY,
            min_direction_changes: MIN_DIRECTION_CHANGES,
            min_swing_deg: MIN_OSCILLATION_SWING_DEG,
            shake_min_magnitude_deg: SHAKE_MIN_MAGNITUDE_DEG,
            nod_min_magnitude_deg: NOD_MIN_MAGNITUDE_DEG,
            movement_tolerance: 0.15,
        }
    }
}

/// Temporal conditions derived after folding one snapshot into the state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TemporalSignals {
    pub eyes_closed: bool,
    pub closed_duration_ms: u64,
    pub sustained_closure: bool,
    pub blink_detected: bool,
    pub blink_rate_per_min: f64,
    pub yaw_oscillation: OscillationStats,
    pub pitch_oscillation: OscillationStats,
    pub shaking: bool,
    pub nodding: bool,
    /// 1.0 for a perfectly still face, 0.0 at or beyond the movement tolerance.
    pub movement_stability: f64,
    pub eyes_open_duration_ms: u64,
}

pub struct TemporalTracker {
    config: TrackingConfig,
    state: TemporalState,
}

impl TemporalTracker {
    pub fn new(config: TrackingConfig) -> Self {
        let state = TemporalState::new(&config);
        Self { config, state }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn state(&self) -> &TemporalState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TemporalState {
        &mut self.state
    }

    pub fn update(&mut self, snapshot: &FeatureSnapshot, timestamp_ms: u64) -> TemporalSignals {
        let cfg = &self.config;
        let state = &mut self.state;

        state.position_history.push(PositionSample {
            x: snapshot.face_center.x,
            y: snapshot.face_center.y,
            size: snapshot.face_size,
            timestamp_ms,
        });
        state.yaw_history.push(AngleSample {
            value: snapshot.head_pose.yaw,
            timestamp_ms,
        });
        state.pitch_history.push(AngleSample {
            value: snapshot.head_pose.pitch,
            timestamp_ms,
        });

        let eyes_closed = snapshot.eye_aspect_ratio.both_below(cfg.closed_eye_threshold);
        let mut blink_detected = false;
        if eyes_closed {
            if state.eyes_closed_since.is_none() {
                state.eyes_closed_since = Some(timestamp_ms);
                let debounced = state
                    .last_blink_at
                    .is_some_and(|last| timestamp_ms.saturating_sub(last) < cfg.blink_debounce_ms);
                if !debounced {
                    state.blink_timestamps.push(timestamp_ms);
                    state.last_blink_at = Some(timestamp_ms);
                    blink_detected = true;
                }
            }
            state.eyes_open_since = None;
        } else {
            state.eyes_closed_since = None;
            state.eyes_open_since.get_or_insert(timestamp_ms);
        }

        let closed_duration_ms = state
            .eyes_closed_since
            .map_or(0, |since| timestamp_ms.saturating_sub(since));
        let eyes_open_duration_ms = state
            .eyes_open_since
            .map_or(0, |since| timestamp_ms.saturating_sub(since));

        let yaw_oscillation = oscillation::measure(
            state.yaw_history.recent(cfg.oscillation_window).map(|s| s.value),
            cfg.min_swing_deg,
        );
        let pitch_oscillation = oscillation::measure(
            state.pitch_history.recent(cfg.oscillation_window).map(|s| s.value),
            cfg.min_swing_deg,
        );

        TemporalSignals {
            eyes_closed,
            closed_duration_ms,
            sustained_closure: eyes_closed && closed_duration_ms >= cfg.sustained_closure_ms,
            blink_detected,
            blink_rate_per_min: blink_rate(state, cfg, timestamp_ms),
            yaw_oscillation,
            pitch_oscillation,
            shaking: yaw_oscillation
                .is_oscillating(cfg.min_direction_changes, cfg.shake_min_magnitude_deg),
            nodding: pitch_oscillation
                .is_oscillating(cfg.min_direction_changes, cfg.nod_min_magnitude_deg),
            movement_stability: movement_stability(state, cfg.movement_tolerance),
            eyes_open_duration_ms,
        }
    }

    /// Eye continuity cannot be confirmed across a frame without a face, so
    /// the closure and open-duration clocks restart. Rolling histories stay.
    pub fn face_lost(&mut self) {
        self.state.clear_eye_bookkeeping();
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }
}

fn blink_rate(state: &TemporalState, cfg: &TrackingConfig, now: u64) -> f64 {
    let window = cfg.blink_rate_window_ms.max(1);
    let recent = state
        .blink_timestamps
        .iter()
        .filter(|&&t| now.saturating_sub(t) <= window)
        .count();
    recent as f64 * 60_000.0 / window as f64
}

fn movement_stability(state: &TemporalState, tolerance: f64) -> f64 {
    let samples: Vec<&PositionSample> = state.position_history.iter().collect();
    if samples.len() < 2 {
        return 1.0;
    }
    let steps = samples.len() - 1;
    let displacement: f64 = samples
        .windows(2)
        .map(|w| ((w[1].x - w[0].x).powi(2) + (w[1].y - w[0].y).powi(2)).sqrt())
        .sum::<f64>()
        / steps as f64;
    let size = samples.iter().map(|s| s.size).sum::<f64>() / samples.len() as f64;

    let relative = safe_ratio(displacement, size, 0.0);
    let stability = 1.0 - safe_ratio(relative, tolerance, 1.0);
    if stability.is_finite() {
        stability.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
