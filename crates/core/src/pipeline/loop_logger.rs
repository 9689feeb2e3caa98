use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting observer for capture loop events.
///
/// The CLI reports through `log`; tests discard everything.
pub trait LoopLogger {
    /// A frame was pushed to the display.
    fn frame_rendered(&mut self, index: usize);

    /// A read returned an empty frame and the iteration was skipped.
    fn frame_skipped(&mut self);

    /// Record how long a named loop stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces per frame).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-loop summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullLoopLogger;

impl LoopLogger for NullLoopLogger {
    fn frame_rendered(&mut self, _index: usize) {}
    fn frame_skipped(&mut self) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count and sum of one timing stage or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunningStat {
    count: usize,
    total: f64,
}

impl RunningStat {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Aggregates per-stage timings and metrics and reports a summary
/// through the `log` facade when the loop stops.
///
/// Only running aggregates are kept, so memory stays constant however long
/// the loop runs. Rendered-frame notices are throttled to every
/// `throttle_frames` frames.
pub struct SummaryLoopLogger {
    throttle_frames: usize,
    timings: HashMap<String, RunningStat>,
    metrics: HashMap<String, RunningStat>,
    start_time: Instant,
    rendered: usize,
    skipped: usize,
}

impl SummaryLoopLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            rendered: 0,
            skipped: 0,
        }
    }

    /// Returns the formatted summary string, or `None` if nothing was rendered
    /// or skipped.
    pub fn summary_string(&self) -> Option<String> {
        if self.rendered == 0 && self.skipped == 0 {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Capture loop summary ({} frames rendered, {} skipped, {:.1}s total):",
            self.rendered,
            self.skipped,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let stat = &self.timings[stage];
            let total_ms = stat.total();
            let avg_ms = stat.mean();
            lines.push(format!(
                "  {stage:8}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            lines.push(format!("  {name}: avg {:.1}", self.metrics[name].mean()));
        }

        if self.rendered > 0 && elapsed_ms > 0.0 {
            let fps = self.rendered as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<RunningStat> {
        self.timings.get(stage).copied()
    }

    pub fn metrics_for(&self, name: &str) -> Option<RunningStat> {
        self.metrics.get(name).copied()
    }

    pub fn rendered(&self) -> usize {
        self.rendered
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Default for SummaryLoopLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl LoopLogger for SummaryLoopLogger {
    fn frame_rendered(&mut self, index: usize) {
        self.rendered += 1;
        if self.rendered % self.throttle_frames == 0 {
            log::info!("Rendered {} frames (last capture #{index})", self.rendered);
        }
    }

    fn frame_skipped(&mut self) {
        self.skipped += 1;
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
