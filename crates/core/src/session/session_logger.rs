use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Observer for session events.
///
/// The detection and render loops report through this trait so the CLI can
/// print a timing report while tests stay silent.
pub trait SessionLogger: Send {
    /// Record how long one run of a named stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces found, current rotation).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Logger shared between the session threads.
pub type SharedSessionLogger = Arc<Mutex<dyn SessionLogger>>;

/// Discards all events.
pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Collects per-stage timings and metrics and logs a report at the end of
/// the session.
pub struct StdoutSessionLogger {
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    messages: Vec<String>,
}

impl StdoutSessionLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!("Session summary ({elapsed_s:.1}s):")];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let runs = durations.len();
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = mean(durations);
            let rate = if elapsed_s > 0.0 {
                runs as f64 / elapsed_s
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: {runs:6} runs  avg {avg_ms:6.1}ms  total {total_ms:7.0}ms  ({rate:.1}/s)"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let last = values.last().copied().unwrap_or(0.0);
            lines.push(format!(
                "  {name}: avg {:.3}  last {last:.3}",
                mean(values)
            ));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Default for StdoutSessionLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLogger for StdoutSessionLogger {
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

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullSessionLogger;
        logger.timing("detect", 5.0);
        logger.metric("faces", 1.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = StdoutSessionLogger::new();
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("render", 5.0);

        assert_eq!(logger.timings_for("detect").unwrap(), &[20.0, 30.0]);
        assert_eq!(logger.timings_for("render").unwrap(), &[5.0]);
        assert!(logger.timings_for("write").is_none());
    }

    #[test]
    fn test_metric_records_values() {
        let mut logger = StdoutSessionLogger::new();
        logger.metric("rotation", 0.1);
        logger.metric("rotation", 0.3);

        let values = logger.metrics_for("rotation").unwrap();
        assert_eq!(values.len(), 2);
        assert_relative_eq!(mean(values), 0.2);
    }

    #[test]
    fn test_summary_includes_stages_and_metrics() {
        let mut logger = StdoutSessionLogger::new();
        logger.timing("detect", 20.0);
        logger.timing("render", 4.0);
        logger.metric("faces", 1.0);
        logger.metric("faces", 0.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Session summary"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("render"));
        assert!(summary.contains("faces: avg 0.500  last 0.000"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutSessionLogger::new().summary_string().is_none());
    }

    #[test]
    fn test_info_stores_messages() {
        let mut logger = StdoutSessionLogger::new();
        logger.info("tracking enabled");
        assert_eq!(logger.messages, vec!["tracking enabled".to_string()]);
    }

    #[test]
    fn test_mean_of_empty_is_zero() {
        assert_relative_eq!(mean(&[]), 0.0);
    }
}
