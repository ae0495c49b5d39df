use crate::tracking::domain::rolling_history::RollingHistory;

/// Trailing moving average over the most recent scores.
///
/// A window of 1 passes scores through unchanged.
#[derive(Clone, Copy, Debug)]
pub struct ScoreSmoother {
    window: usize,
}

impl ScoreSmoother {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Record `score` and return the rounded mean of the last `window` entries.
    pub fn smooth(&self, history: &mut RollingHistory<u8>, score: u8) -> u8 {
        history.push(score);
        let (sum, n) = history
            .recent(self.window)
            .fold((0u32, 0u32), |(sum, n), &s| (sum + u32::from(s), n + 1));
        if n == 0 {
            return score;
        }
        let mean = (f64::from(sum) / f64::from(n)).round();
        mean.clamp(0.0, 100.0) as u8
    }
}
