//! End-of-run export for the flow-generation collaborator.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use screenwalk_explore::{
    ActionCandidate, CoverageMetrics, ExplorationIssue, ExplorationState, ExplorationStatus, Screen,
    SensorCandidate, StopReason, ToggleRecord,
};
use screenwalk_graph::{NavigationGraph, PathStep};
use screenwalk_ident::ScreenId;
use serde::{Deserialize, Serialize};

use crate::analytics::RunAnalytics;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationReport {
    pub target_package: String,
    pub status: ExplorationStatus,
    pub stop_reason: Option<StopReason>,
    pub passes: u32,
    pub entry_screen: Option<ScreenId>,
    pub screens: Vec<Screen>,
    pub graph: NavigationGraph,
    pub issues: Vec<ExplorationIssue>,
    pub sensor_candidates: Vec<SensorCandidate>,
    pub action_candidates: Vec<ActionCandidate>,
    /// Toggles still to revert, most recent first.
    pub pending_undo: Vec<ToggleRecord>,
    /// Most reliable route from the entry screen to every reachable screen.
    pub paths: BTreeMap<ScreenId, Vec<PathStep>>,
    pub coverage: CoverageMetrics,
    pub analytics: RunAnalytics,
    pub finished_at: DateTime<Utc>,
}

impl ExplorationReport {
    pub fn build(
        state: &ExplorationState,
        coverage: CoverageMetrics,
        analytics: RunAnalytics,
        pending_undo: Vec<ToggleRecord>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let graph = state.graph();
        let paths: BTreeMap<ScreenId, Vec<PathStep>> = state
            .entry_screen()
            .map(|entry| {
                state
                    .screens()
                    .keys()
                    .filter(|screen| *screen != entry)
                    .filter_map(|screen| {
                        graph
                            .find_optimal_path(entry, screen)
                            .map(|path| (screen.clone(), path))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            target_package: state.target_package().to_string(),
            status: state.status(),
            stop_reason: state.stop_reason(),
            passes: state.pass_number(),
            entry_screen: state.entry_screen().cloned(),
            screens: state.screens().values().cloned().collect(),
            graph: graph.clone(),
            issues: state.issues().iter().cloned().collect(),
            sensor_candidates: state.sensor_candidates().to_vec(),
            action_candidates: state.action_candidates().to_vec(),
            pending_undo,
            paths,
            coverage,
            analytics,
            finished_at,
        }
    }

    pub fn path_to(&self, screen: &ScreenId) -> Option<&[PathStep]> {
        self.paths.get(screen).map(Vec::as_slice)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
