use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use screenwalk_explore::{
    CoverageMetrics, ExplorationState, ExplorationStatus, ExplorationTarget, IssueType, StopReason,
};
use screenwalk_graph::GraphStats;
use screenwalk_ident::ScreenId;
use serde::{Deserialize, Serialize};

use crate::analytics::{AnalyticsSummary, RunAnalytics};

/// How many upcoming targets a snapshot lists.
pub const SNAPSHOT_QUEUE_PREVIEW: usize = 5;

/// Point-in-time view of a run for status readers and telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub target_package: String,
    pub status: ExplorationStatus,
    pub stop_reason: Option<StopReason>,
    pub pass: u32,
    pub current_screen: Option<ScreenId>,
    pub coverage: CoverageMetrics,
    pub graph: GraphStats,
    pub issue_counts: BTreeMap<IssueType, usize>,
    pub queued_targets: usize,
    pub next_targets: Vec<ExplorationTarget>,
    pub recovery_attempts: u32,
    pub analytics: AnalyticsSummary,
    pub taken_at: DateTime<Utc>,
}

impl RunSnapshot {
    pub fn capture(
        state: &ExplorationState,
        coverage: CoverageMetrics,
        analytics: &RunAnalytics,
        taken_at: DateTime<Utc>,
    ) -> Self {
        let mut next_targets = state.queue().to_sorted_vec();
        next_targets.truncate(SNAPSHOT_QUEUE_PREVIEW);
        Self {
            target_package: state.target_package().to_string(),
            status: state.status(),
            stop_reason: state.stop_reason(),
            pass: state.pass_number(),
            current_screen: state.current_screen().cloned(),
            coverage,
            graph: state.graph().stats(),
            issue_counts: state.issues().count_by_type(),
            queued_targets: state.queue().len(),
            next_targets,
            recovery_attempts: state.recovery_attempts(),
            analytics: analytics.summary(),
            taken_at,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
