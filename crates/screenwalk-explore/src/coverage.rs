//! Coverage metrics derived from the exploration state.
//!
//! Blocker, problematic and unreachable screens are not counted: they are
//! never explored, so counting them would cap coverage below the target.
//! [`CoverageTracker::compute_within`] narrows the count further to the
//! screens a planner actually generates work for.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::state::{ExplorationState, Screen};
use crate::target::{sort_frontier, FrontierItem};

pub const DEFAULT_COVERAGE_TARGET: f64 = 0.90;

/// Relative weight of each coverage component in the overall fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageWeights {
    pub screen: f64,
    pub element: f64,
    pub scroll: f64,
}

impl Default for CoverageWeights {
    fn default() -> Self {
        Self {
            screen: 0.3,
            element: 0.5,
            scroll: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageMetrics {
    pub screens_discovered: usize,
    pub screens_fully_explored: usize,
    pub elements_discovered: usize,
    pub elements_visited: usize,
    pub scroll_containers_discovered: usize,
    pub scroll_containers_completed: usize,
    pub screen_coverage: f64,
    pub element_coverage: f64,
    pub scroll_coverage: f64,
    pub overall_coverage: f64,
    /// Screens still carrying unvisited work, best revisit candidate first.
    pub frontier: Vec<FrontierItem>,
}

impl CoverageMetrics {
    pub fn is_complete(&self, target: f64) -> bool {
        self.overall_coverage >= target
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageTracker {
    weights: CoverageWeights,
}

impl CoverageTracker {
    pub fn new(weights: CoverageWeights) -> Self {
        Self { weights }
    }

    pub fn compute(&self, state: &ExplorationState) -> CoverageMetrics {
        self.compute_within(state, |_| true)
    }

    /// Like [`compute`](Self::compute), counting only screens `in_scope` accepts.
    pub fn compute_within(
        &self,
        state: &ExplorationState,
        in_scope: impl Fn(&Screen) -> bool,
    ) -> CoverageMetrics {
        let graph = state.graph();
        let mut metrics = CoverageMetrics::default();
        let mut elements = BTreeSet::new();
        let mut containers = BTreeSet::new();

        for (screen_id, screen) in state.screens() {
            if !state.is_explorable(screen_id) || !in_scope(screen) {
                continue;
            }
            metrics.screens_discovered += 1;
            if graph.is_fully_explored(screen_id) {
                metrics.screens_fully_explored += 1;
            } else {
                let unvisited = state.unvisited_work(screen_id);
                if unvisited > 0 {
                    metrics.frontier.push(FrontierItem {
                        screen_id: screen_id.clone(),
                        unvisited,
                        last_visit: screen.last_captured,
                    });
                }
            }
            elements.extend(screen.actionable_elements().map(|e| e.element_id.as_str()));
            containers.extend(screen.scroll_containers().map(|e| e.element_id.as_str()));
        }

        metrics.elements_discovered = elements.len();
        metrics.elements_visited = elements
            .iter()
            .filter(|id| state.is_element_visited(id))
            .count();
        metrics.scroll_containers_discovered = containers.len();
        metrics.scroll_containers_completed = containers
            .iter()
            .filter(|id| state.is_fully_scrolled(id))
            .count();

        let screen = ratio(metrics.screens_fully_explored, metrics.screens_discovered);
        let element = ratio(metrics.elements_visited, metrics.elements_discovered);
        let scroll = ratio(
            metrics.scroll_containers_completed,
            metrics.scroll_containers_discovered,
        );
        metrics.screen_coverage = screen.unwrap_or(0.0);
        metrics.element_coverage = element.unwrap_or(0.0);
        metrics.scroll_coverage = scroll.unwrap_or(0.0);
        metrics.overall_coverage = self.overall(screen, element, scroll);

        sort_frontier(&mut metrics.frontier);
        metrics
    }

    /// Weighted mean over the components that have anything discovered.
    fn overall(&self, screen: Option<f64>, element: Option<f64>, scroll: Option<f64>) -> f64 {
        let parts = [
            (screen, self.weights.screen),
            (element, self.weights.element),
            (scroll, self.weights.scroll),
        ];
        let (sum, weight) = parts
            .iter()
            .filter_map(|(value, weight)| value.map(|v| (v * weight, *weight)))
            .fold((0.0, 0.0), |(s, w), (v, wt)| (s + v, w + wt));
        if weight > 0.0 {
            sum / weight
        } else {
            0.0
        }
    }
}

fn ratio(part: usize, whole: usize) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use screenwalk_ident::{Bounds, ScreenDescriptor, UiElement};

    fn metrics(overall: f64) -> CoverageMetrics {
        CoverageMetrics {
            overall_coverage: overall,
            ..Default::default()
        }
    }

    #[test]
    fn test_target_boundary() {
        assert!(metrics(0.90).is_complete(DEFAULT_COVERAGE_TARGET));
        assert!(!metrics(0.899999).is_complete(DEFAULT_COVERAGE_TARGET));
        assert!(metrics(1.0).is_complete(DEFAULT_COVERAGE_TARGET));
    }

    #[test]
    fn test_empty_state_is_zero() {
        let state = ExplorationState::new("com.test");
        let m = CoverageTracker::default().compute(&state);
        assert_eq!(m.overall_coverage, 0.0);
        assert!(m.frontier.is_empty());
    }

    #[test]
    fn test_missing_components_renormalize() {
        let tracker = CoverageTracker::default();
        // Only elements discovered: overall equals element coverage.
        assert!((tracker.overall(None, Some(0.5), None) - 0.5).abs() < 1e-9);
        // Screens and elements: (0.3*1.0 + 0.5*0.5) / 0.8
        assert!((tracker.overall(Some(1.0), Some(0.5), None) - 0.6875).abs() < 1e-9);
        assert_eq!(tracker.overall(None, None, None), 0.0);
    }

    #[test]
    fn test_compute_counts_elements_and_frontier() {
        let mut state = ExplorationState::new("com.test");
        state.start(Utc::now()).unwrap();
        let bounds = Bounds::new(0, 0, 100, 50);
        let ok = UiElement::new(Some("com.test:id/ok"), None, "android.widget.Button", bounds).clickable();
        let cancel = UiElement::new(Some("com.test:id/cancel"), None, "android.widget.Button", bounds).clickable();
        let label = UiElement::new(None, Some("Title"), "android.widget.TextView", bounds);
        let home = state.record_screen(
            &ScreenDescriptor::new("com.test", ".Home", vec![ok.clone(), cancel, label]),
            Utc::now(),
        );
        state.record_action_result(&home, &ok.element_id, true, 3);

        let m = CoverageTracker::default().compute(&state);
        assert_eq!(m.screens_discovered, 1);
        assert_eq!(m.elements_discovered, 2);
        assert_eq!(m.elements_visited, 1);
        assert_eq!(m.scroll_containers_discovered, 0);
        assert_eq!(m.frontier.len(), 1);
        assert_eq!(m.frontier[0].unvisited, 1);
        // Screen 0/1 and element 1/2 with scroll dropped: 0.25 / 0.8
        assert!((m.overall_coverage - 0.3125).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_scope_screens_are_not_counted() {
        let mut state = ExplorationState::new("com.test");
        state.start(Utc::now()).unwrap();
        let bounds = Bounds::new(0, 0, 100, 50);
        let go = UiElement::new(Some("com.test:id/go"), None, "android.widget.Button", bounds).clickable();
        let far = UiElement::new(Some("com.test:id/far"), None, "android.widget.Button", bounds).clickable();
        let home = state.record_screen(&ScreenDescriptor::new("com.test", ".Home", vec![go.clone()]), Utc::now());
        state.record_action_result(&home, &go.element_id, true, 3);
        let deep = state.record_screen(&ScreenDescriptor::new("com.test", ".Deep", vec![far]), Utc::now());
        assert_eq!(state.screen(&deep).unwrap().depth, 1);

        let tracker = CoverageTracker::default();
        assert!(tracker.compute(&state).overall_coverage < 0.9);
        let m = tracker.compute_within(&state, |screen| screen.depth < 1);
        assert_eq!(m.screens_discovered, 1);
        assert_eq!(m.elements_discovered, 1);
        assert!(m.frontier.is_empty());
        assert_eq!(m.overall_coverage, 1.0);
    }
}
