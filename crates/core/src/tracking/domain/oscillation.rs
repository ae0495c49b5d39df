//! Head-shake / head-nod detection from a short series of angles.
//!
//! A single reading cannot tell a shake from a turn. The detector looks at
//! consecutive deltas and requires both enough direction reversals and
//! enough swing in those reversals. Steps smaller than the minimum swing are
//! landmark noise: they neither count as a reversal nor set a direction, so
//! jitter cannot pile up over a long window.

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OscillationStats {
    pub direction_changes: usize,
    /// Sum of |delta| over the deltas that reversed direction, in degrees.
    pub reversal_magnitude: f64,
}

impl OscillationStats {
    pub fn is_oscillating(&self, min_changes: usize, min_magnitude: f64) -> bool {
        self.direction_changes >= min_changes && self.reversal_magnitude >= min_magnitude
    }
}

/// Count reversals across consecutive deltas. Deltas below `min_swing`
/// (including zero) carry no direction and are skipped rather than
/// resetting the sign.
pub fn measure<I>(values: I, min_swing: f64) -> OscillationStats
where
    I: IntoIterator<Item = f64>,
{
    let mut stats = OscillationStats::default();
    let mut prev_value: Option<f64> = None;
    let mut prev_sign: Option<bool> = None;

    for value in values {
        if !value.is_finite() {
            continue;
        }
        if let Some(prev) = prev_value {
            let delta = value - prev;
            if delta != 0.0 && delta.abs() >= min_swing {
                let positive = delta > 0.0;
                if prev_sign.is_some_and(|s| s != positive) {
                    stats.direction_changes += 1;
                    stats.reversal_magnitude += delta.abs();
                }
                prev_sign = Some(positive);
            }
        }
        prev_value = Some(value);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn alternating(amplitude: f64, samples: usize) -> Vec<f64> {
        (0..samples)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn test_monotonic_turn_has_no_reversals() {
        let stats = measure([0.0, 10.0, 20.0, 30.0, 40.0], 5.0);
        assert_eq!(stats.direction_changes, 0);
        assert_relative_eq!(stats.reversal_magnitude, 0.0);
    }

    #[test]
    fn test_alternating_counts_each_reversal() {
        // 7 samples -> 6 deltas -> 5 reversals of 140 each
        let stats = measure(alternating(70.0, 7), 5.0);
        assert_eq!(stats.direction_changes, 5);
        assert_relative_eq!(stats.reversal_magnitude, 700.0);
    }

    #[test]
    fn test_zero_deltas_do_not_break_the_run() {
        let stats = measure([0.0, 10.0, 10.0, 0.0, 0.0, 10.0], 5.0);
        assert_eq!(stats.direction_changes, 2);
        assert_relative_eq!(stats.reversal_magnitude, 20.0);
    }

    #[test]
    fn test_non_finite_values_are_skipped() {
        let stats = measure([0.0, f64::NAN, 10.0, 0.0], 5.0);
        assert_eq!(stats.direction_changes, 1);
    }

    #[test]
    fn test_empty_and_single_sample() {
        assert_eq!(measure(Vec::<f64>::new(), 5.0), OscillationStats::default());
        assert_eq!(measure([5.0], 5.0), OscillationStats::default());
    }

    #[rstest]
    #[case::large_swing(70.0, true)]
    #[case::moderate_swing(5.0, false)]
    fn test_frequency_and_magnitude_both_required(#[case] amplitude: f64, #[case] expected: bool) {
        // 6 samples -> 4 reversals; +-5 only sums to 40 degrees
        let stats = measure(alternating(amplitude, 6), 5.0);
        assert_eq!(stats.direction_changes, 4);
        assert_eq!(stats.is_oscillating(4, 50.0), expected);
    }

    #[test]
    fn test_long_jitter_below_swing_never_accumulates() {
        // +-2 over 20 samples would sum to 18 * 4 = 72 degrees without the floor
        let stats = measure(alternating(2.0, 20), 5.0);
        assert_eq!(stats, OscillationStats::default());
        assert!(!stats.is_oscillating(4, 50.0));
    }

    #[test]
    fn test_small_steps_do_not_set_direction() {
        // the 0 -> 2 -> 0 wobble is ignored; only the two large reversals count
        let stats = measure([0.0, 20.0, 22.0, 20.0, 0.0, 20.0], 5.0);
        assert_eq!(stats.direction_changes, 2);
        assert_relative_eq!(stats.reversal_magnitude, 40.0);
    }

    #[test]
    fn test_too_few_reversals_does_not_fire() {
        let stats = measure(alternating(70.0, 4), 5.0);
        assert_eq!(stats.direction_changes, 2);
        assert!(!stats.is_oscillating(4, 50.0));
    }
}
