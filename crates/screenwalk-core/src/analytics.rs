//! Run analytics.
//!
//! Tracks the coverage curve, per-pass summaries and action outcomes for
//! run-level observability.

use serde::{Deserialize, Serialize};

use screenwalk_explore::CoverageMetrics;

/// A coverage measurement taken after a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoveragePoint {
    /// Actions dispatched when this was measured.
    pub step: u64,
    pub pass: u32,
    /// Overall coverage (0.0-1.0).
    pub overall: f64,
    pub screens_discovered: usize,
    pub elements_visited: usize,
}

/// What one pass achieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    pub pass: u32,
    /// Actions dispatched during this pass.
    pub steps: u64,
    pub screens_discovered: usize,
    pub overall_coverage: f64,
    /// Distinct transitions first observed during this pass.
    pub new_transitions: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunAnalytics {
    pub coverage_curve: Vec<CoveragePoint>,
    pub passes: Vec<PassSummary>,
    pub total_steps: u64,
    pub failed_actions: u64,
    pub peak_coverage: f64,
    pub elapsed_secs: f64,
    /// Step and transition count when the current pass began.
    pass_start_step: u64,
    pass_start_transitions: usize,
}

impl RunAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a coverage measurement.
    pub fn record_coverage(&mut self, pass: u32, metrics: &CoverageMetrics) {
        self.coverage_curve.push(CoveragePoint {
            step: self.total_steps,
            pass,
            overall: metrics.overall_coverage,
            screens_discovered: metrics.screens_discovered,
            elements_visited: metrics.elements_visited,
        });
        if metrics.overall_coverage > self.peak_coverage {
            self.peak_coverage = metrics.overall_coverage;
        }
    }

    pub fn record_action(&mut self, success: bool) {
        self.total_steps += 1;
        if !success {
            self.failed_actions += 1;
        }
    }

    /// Close the current pass. `transitions` is the graph's running total.
    pub fn end_pass(&mut self, pass: u32, metrics: &CoverageMetrics, transitions: usize) {
        self.passes.push(PassSummary {
            pass,
            steps: self.total_steps - self.pass_start_step,
            screens_discovered: metrics.screens_discovered,
            overall_coverage: metrics.overall_coverage,
            new_transitions: transitions.saturating_sub(self.pass_start_transitions),
        });
        self.pass_start_step = self.total_steps;
        self.pass_start_transitions = transitions;
    }

    pub fn set_elapsed(&mut self, secs: f64) {
        self.elapsed_secs = secs;
    }

    /// Fraction of dispatched actions that failed.
    pub fn failure_rate(&self) -> f64 {
        if self.total_steps == 0 {
            0.0
        } else {
            self.failed_actions as f64 / self.total_steps as f64
        }
    }

    /// Coverage gained per 100 steps between the first and last measurement.
    pub fn coverage_velocity(&self) -> f64 {
        match (self.coverage_curve.first(), self.coverage_curve.last()) {
            (Some(first), Some(last)) if last.step > first.step => {
                (last.overall - first.overall) / (last.step - first.step) as f64 * 100.0
            }
            _ => 0.0,
        }
    }

    pub fn summary(&self) -> AnalyticsSummary {
        AnalyticsSummary {
            total_steps: self.total_steps,
            failed_actions: self.failed_actions,
            peak_coverage: self.peak_coverage,
            elapsed_secs: self.elapsed_secs,
            failure_rate: self.failure_rate(),
            coverage_velocity: self.coverage_velocity(),
            passes_completed: self.passes.len() as u32,
        }
    }
}

/// Compact analytics for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_steps: u64,
    pub failed_actions: u64,
    pub peak_coverage: f64,
    pub elapsed_secs: f64,
    pub failure_rate: f64,
    pub coverage_velocity: f64,
    pub passes_completed: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(overall: f64, screens: usize) -> CoverageMetrics {
        CoverageMetrics {
            overall_coverage: overall,
            screens_discovered: screens,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_analytics_is_empty() {
        let a = RunAnalytics::new();
        assert_eq!(a.total_steps, 0);
        assert_eq!(a.peak_coverage, 0.0);
        assert!(a.coverage_curve.is_empty());
    }

    #[test]
    fn test_peak_survives_drop() {
        let mut a = RunAnalytics::new();
        a.record_coverage(1, &metrics(0.6, 3));
        a.record_coverage(2, &metrics(0.2, 3));
        assert!((a.peak_coverage - 0.6).abs() < 1e-9);
        assert_eq!(a.coverage_curve.len(), 2);
    }

    #[test]
    fn test_failure_rate() {
        let mut a = RunAnalytics::new();
        a.record_action(true);
        a.record_action(false);
        a.record_action(true);
        a.record_action(false);
        assert!((a.failure_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_coverage_velocity() {
        let mut a = RunAnalytics::new();
        a.record_coverage(1, &metrics(0.0, 1));
        for _ in 0..200 {
            a.record_action(true);
        }
        a.record_coverage(1, &metrics(0.5, 4));
        // 0.5 over 200 steps = 0.25 per 100 steps
        assert!((a.coverage_velocity() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_pass_summaries_are_deltas() {
        let mut a = RunAnalytics::new();
        for _ in 0..5 {
            a.record_action(true);
        }
        a.end_pass(1, &metrics(0.4, 3), 4);
        for _ in 0..2 {
            a.record_action(true);
        }
        a.end_pass(2, &metrics(0.7, 5), 6);

        assert_eq!(a.passes[0].steps, 5);
        assert_eq!(a.passes[1].steps, 2);
        assert_eq!(a.passes[1].new_transitions, 2);
        assert_eq!(a.summary().passes_completed, 2);
    }

    #[test]
    fn test_zero_steps_rates() {
        let a = RunAnalytics::new();
        assert_eq!(a.failure_rate(), 0.0);
        assert_eq!(a.coverage_velocity(), 0.0);
    }
}
