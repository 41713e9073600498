//! Goal policies and the run configuration.
//!
//! Everything a run can be tuned with lives in [`ExplorationConfig`], which
//! has exactly one default table (its `Default` impl) and decodes partial or
//! older JSON by filling every missing field from that table.

use serde::{Deserialize, Serialize};

/// Current configuration schema. Bump when a field changes meaning.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// What a run optimizes for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExplorationGoal {
    /// Low fixed limits, minimal scrolling. Speed over completeness.
    #[default]
    QuickScan,
    /// Higher limits, thorough scrolling. Completeness over speed.
    DeepMap,
    /// Stop once coverage reaches the target, or at the safety time cap.
    CompleteCoverage,
}

impl ExplorationGoal {
    pub fn default_limits(self) -> ExplorationLimits {
        match self {
            Self::QuickScan => ExplorationLimits {
                max_depth: 3,
                max_screens: 15,
                max_elements: 100,
                max_duration_secs: 120,
                max_scrolls_per_container: 1,
            },
            Self::DeepMap => ExplorationLimits {
                max_depth: 10,
                max_screens: 100,
                max_elements: 1000,
                max_duration_secs: 900,
                max_scrolls_per_container: 5,
            },
            Self::CompleteCoverage => ExplorationLimits {
                max_depth: 25,
                max_screens: 500,
                max_elements: 5000,
                max_duration_secs: 30 * 60,
                max_scrolls_per_container: 10,
            },
        }
    }

    /// Revisit under-explored screens before declaring a pass done.
    pub fn backtracks(self) -> bool {
        matches!(self, Self::CompleteCoverage)
    }

    /// Coverage reaching the target ends the run mid-pass.
    pub fn stops_on_coverage(self) -> bool {
        matches!(self, Self::CompleteCoverage)
    }
}

/// Hard caps for a run. Reaching one ends the run as `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationLimits {
    /// Hops from the entry screen beyond which targets are not generated.
    pub max_depth: u32,
    pub max_screens: u32,
    /// Distinct elements acted on.
    pub max_elements: u32,
    pub max_duration_secs: u64,
    pub max_scrolls_per_container: u32,
}

impl Default for ExplorationLimits {
    fn default() -> Self {
        ExplorationGoal::default().default_limits()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub schema_version: u32,
    pub goal: ExplorationGoal,
    /// Overrides the goal's preset limits when present.
    pub limits: Option<ExplorationLimits>,
    /// Overall coverage fraction considered complete.
    pub coverage_target: f64,
    /// 0 means unlimited (bounded only by reaching the coverage target).
    pub max_passes: u32,
    /// Skip further passes once the coverage target is met. Mid-pass stops
    /// also need a goal that [stops on coverage](ExplorationGoal::stops_on_coverage).
    pub stop_at_target_coverage: bool,
    /// Screens of these packages never get targets.
    pub excluded_packages: Vec<String>,
    /// Elements whose resource id contains any of these never get targets.
    pub excluded_resource_patterns: Vec<String>,
    /// Gesture failures tolerated per element before it is abandoned.
    pub max_element_retries: u32,
    /// Failed planned-path attempts tolerated per screen before it is excluded.
    pub max_screen_reach_failures: u32,
    /// App relaunches tolerated before the run ends in error.
    pub max_recovery_attempts: u32,
    /// Revert toggles flipped during exploration when the run ends.
    pub non_destructive: bool,
    pub stabilization_wait_ms: u64,
    pub transition_wait_ms: u64,
    /// Budget for one batched Q-value scoring call.
    pub scorer_timeout_ms: u64,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            goal: ExplorationGoal::QuickScan,
            limits: None,
            coverage_target: 0.90,
            max_passes: 1,
            stop_at_target_coverage: true,
            excluded_packages: vec![
                "com.android.systemui".to_string(),
                "com.android.launcher".to_string(),
                "com.android.launcher3".to_string(),
                "com.google.android.apps.nexuslauncher".to_string(),
                "com.android.settings".to_string(),
                "com.google.android.inputmethod.latin".to_string(),
                "com.android.permissioncontroller".to_string(),
            ],
            excluded_resource_patterns: Vec::new(),
            max_element_retries: 3,
            max_screen_reach_failures: 3,
            max_recovery_attempts: 5,
            non_destructive: true,
            stabilization_wait_ms: 1_000,
            transition_wait_ms: 2_000,
            scorer_timeout_ms: 500,
        }
    }
}

impl ExplorationConfig {
    /// Defaults with a goal applied.
    pub fn for_goal(goal: ExplorationGoal) -> Self {
        Self {
            goal,
            ..Self::default()
        }
    }

    pub fn effective_limits(&self) -> ExplorationLimits {
        self.limits.unwrap_or_else(|| self.goal.default_limits())
    }

    pub fn is_package_excluded(&self, package_name: &str) -> bool {
        self.excluded_packages.iter().any(|p| p == package_name)
    }

    pub fn is_resource_excluded(&self, resource_id: &str) -> bool {
        self.excluded_resource_patterns
            .iter()
            .any(|p| !p.is_empty() && resource_id.contains(p.as_str()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version > CONFIG_SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.schema_version,
                supported: CONFIG_SCHEMA_VERSION,
            });
        }
        if !(self.coverage_target > 0.0 && self.coverage_target <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "coverage_target",
                reason: format!("{} is outside (0, 1]", self.coverage_target),
            });
        }
        if let Some(limits) = &self.limits {
            if limits.max_duration_secs == 0 {
                return Err(ConfigError::Invalid {
                    field: "limits.max_duration_secs",
                    reason: "must be positive".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode and validate. Missing fields take their defaults; an absent
    /// `schema_version` is read as the current one.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
