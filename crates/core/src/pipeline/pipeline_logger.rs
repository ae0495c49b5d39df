use std::collections::HashMap;
use std::time::Instant;

use crate::scoring::domain::attention_report::{AttentionReport, ScoringBranch};

/// Cross-cutting logger for session orchestration events.
///
/// Keeps the session loop independent of where diagnostics end up (stdout,
/// a host UI, nowhere).
pub trait PipelineLogger: Send {
    /// Called once per scored frame.
    fn frame_scored(&mut self, report: &AttentionReport, branch: ScoringBranch);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. blink rate, movement stability).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger for hosts with their own reporting, and for tests.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn frame_scored(&mut self, _report: &AttentionReport, _branch: ScoringBranch) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI-oriented logger: per-stage timings, metrics, and the distribution of
/// scoring branches, summarised when the session ends.
///
/// Per-frame output is throttled to every `throttle_frames` frames.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    branches: HashMap<ScoringBranch, usize>,
    score_sum: u64,
    start_time: Instant,
    frames: usize,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            branches: HashMap::new(),
            score_sum: 0,
            start_time: Instant::now(),
            frames: 0,
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if nothing was scored.
    pub fn summary_string(&self) -> Option<String> {
        if self.frames == 0 && self.timings.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames;
        let mut lines = vec![format!(
            "Session summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            lines.push(format!("  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let avg = values.iter().sum::<f64>() / values.len().max(1) as f64;
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        if frames > 0 {
            let avg_score = self.score_sum as f64 / frames as f64;
            lines.push(format!("  Average score: {avg_score:.1}"));

            let mut branches: Vec<_> = self.branches.iter().collect();
            branches.sort_by(|a, b| b.1.cmp(a.1).then(a.0.as_str().cmp(b.0.as_str())));
            for (branch, count) in branches {
                let pct = *count as f64 / frames as f64 * 100.0;
                lines.push(format!("  {branch:12}: {count} frames ({pct:4.1}%)"));
            }

            if elapsed_ms > 0.0 {
                let fps = frames as f64 / (elapsed_ms / 1000.0);
                lines.push(format!("  Throughput: {fps:.1} fps"));
            }
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn branch_count(&self, branch: ScoringBranch) -> usize {
        self.branches.get(&branch).copied().unwrap_or(0)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn frame_scored(&mut self, report: &AttentionReport, branch: ScoringBranch) {
        self.frames += 1;
        self.score_sum += u64::from(report.score);
        *self.branches.entry(branch).or_default() += 1;
        if self.frames % self.throttle_frames == 0 {
            log::info!(
                "Frame {}: score {} ({branch}) at {} ms",
                self.frames,
                report.score,
                report.timestamp_ms
            );
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn report(score: u8) -> AttentionReport {
        AttentionReport {
            score,
            face_detected: score > 0,
            looking_at_screen: score == 100,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.frame_scored(&report(70), ScoringBranch::Partial);
        logger.timing("detect", 5.0);
        logger.metric("blink_rate", 12.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_and_metric_records_values() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.metric("movement_stability", 0.5);

        assert_eq!(logger.timings_for("detect").unwrap(), &[20.0, 30.0]);
        assert_eq!(logger.metrics_for("movement_stability").unwrap(), &[0.5]);
        assert!(logger.timings_for("score").is_none());
    }

    #[test]
    fn test_branch_counts() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.frame_scored(&report(100), ScoringBranch::Ideal);
        logger.frame_scored(&report(100), ScoringBranch::Ideal);
        logger.frame_scored(&report(0), ScoringBranch::NoFace);
        assert_eq!(logger.branch_count(ScoringBranch::Ideal), 2);
        assert_eq!(logger.branch_count(ScoringBranch::NoFace), 1);
        assert_eq!(logger.branch_count(ScoringBranch::Shaking), 0);
    }

    #[test]
    fn test_summary_contents() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("detect", 10.0);
        logger.metric("blink_rate", 15.0);
        logger.frame_scored(&report(100), ScoringBranch::Ideal);
        logger.frame_scored(&report(70), ScoringBranch::Partial);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Session summary (2 frames"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("blink_rate: avg 15.0"));
        assert!(summary.contains("Average score: 85.0"));
        assert!(summary.contains("ideal"));
        assert!(summary.contains("fps"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutPipelineLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_info_stores_messages() {
        let mut logger = StdoutPipelineLogger::default();
        logger.info("camera ready");
        assert_eq!(logger.messages, vec!["camera ready".to_string()]);
        assert_eq!(logger.throttle_frames, 30);
    }

    #[test]
    fn test_average_score_tracks_frames() {
        let mut logger = StdoutPipelineLogger::new(1);
        for s in [0, 50, 100] {
            logger.frame_scored(&report(s), ScoringBranch::Partial);
        }
        assert_eq!(logger.frames, 3);
        assert_relative_eq!(logger.score_sum as f64 / 3.0, 50.0);
    }
}
