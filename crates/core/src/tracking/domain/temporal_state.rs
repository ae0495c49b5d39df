use crate::tracking::domain::rolling_history::RollingHistory;
use crate::tracking::domain::temporal_tracker::TrackingConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionSample {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub timestamp_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngleSample {
    pub value: f64,
    pub timestamp_ms: u64,
}

/// Everything one tracking session remembers between frames.
///
/// Owned by a single `TemporalTracker`; never shared and never persisted.
/// `reset` returns it to the state of a freshly started session.
#[derive(Clone, Debug)]
pub struct TemporalState {
    pub position_history: RollingHistory<PositionSample>,
    pub yaw_history: RollingHistory<AngleSample>,
    pub pitch_history: RollingHistory<AngleSample>,
    pub blink_timestamps: RollingHistory<u64>,
    pub attention_score_history: RollingHistory<u8>,
    /// Set on the open to closed transition, cleared when the eyes reopen.
    pub eyes_closed_since: Option<u64>,
    pub eyes_open_since: Option<u64>,
    pub last_blink_at: Option<u64>,
}

impl TemporalState {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            position_history: RollingHistory::new(config.position_history_capacity),
            yaw_history: RollingHistory::new(config.angle_history_capacity),
            pitch_history: RollingHistory::new(config.angle_history_capacity),
            blink_timestamps: RollingHistory::new(config.blink_history_capacity),
            attention_score_history: RollingHistory::new(config.score_history_capacity),
            eyes_closed_since: None,
            eyes_open_since: None,
            last_blink_at: None,
        }
    }

    pub fn reset(&mut self) {
        self.position_history.clear();
        self.yaw_history.clear();
        self.pitch_history.clear();
        self.blink_timestamps.clear();
        self.attention_score_history.clear();
        self.clear_eye_bookkeeping();
        self.last_blink_at = None;
    }

    pub fn clear_eye_bookkeeping(&mut self) {
        self.eyes_closed_since = None;
        self.eyes_open_since = None;
    }
}
