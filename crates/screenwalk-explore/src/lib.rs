pub mod candidate;
pub mod coverage;
pub mod goal;
pub mod issue;
pub mod limits;
pub mod oracle;
pub mod planner;
pub mod retry;
pub mod state;
pub mod target;

pub use candidate::{merge_by_element_id, ActionCandidate, ElementKeyed, SensorCandidate};
pub use coverage::{CoverageMetrics, CoverageTracker, CoverageWeights, DEFAULT_COVERAGE_TARGET};
pub use goal::{ConfigError, ExplorationConfig, ExplorationGoal, ExplorationLimits};
pub use issue::{CorrectionAction, CorrectionError, ExplorationIssue, IssueContext, IssueLog, IssueType, ScrollDirection};
pub use limits::{LimitChecker, RunUsage, StopReason};
pub use oracle::{QValueScorer, TimedScorer};
pub use planner::{Planner, PlannerDecision};
pub use retry::{FailureTracker, FailureVerdict};
pub use state::{ActionOutcome, ExplorationState, ExplorationStatus, Screen, StateError, ToggleRecord};
pub use target::{ExplorationTarget, FrontierItem, TargetKind, TargetQueue};
