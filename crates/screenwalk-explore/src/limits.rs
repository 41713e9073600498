//! Run limits.
//!
//! Caps on wall time, discovered screens, elements acted on, and recovery
//! attempts. Hitting one produces a [`StopReason`]; the run keeps whatever it
//! discovered so far.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::goal::ExplorationLimits;

/// Why a run ended (or is about to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Overall coverage reached the configured target.
    CoverageTargetReached,
    /// No work left and no further pass allowed.
    ExplorationExhausted,
    /// `max_passes` passes completed.
    PassLimitReached,
    DurationExceeded,
    ScreenLimitReached,
    ElementLimitReached,
    /// App relaunches exceeded `max_recovery_attempts`.
    RecoveryAttemptsExceeded,
    /// Operator or driver asked to stop.
    UserCancelled,
}

impl StopReason {
    /// Ran to a natural end rather than being cut off.
    pub fn is_natural(self) -> bool {
        matches!(
            self,
            Self::CoverageTargetReached | Self::ExplorationExhausted | Self::PassLimitReached
        )
    }
}

/// Current consumption, as counted by the exploration state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunUsage {
    pub screens: usize,
    pub elements: usize,
    pub recovery_attempts: u32,
}

/// Check run usage against limits.
#[derive(Debug, Clone)]
pub struct LimitChecker {
    limits: ExplorationLimits,
    max_recovery_attempts: u32,
    started_at: DateTime<Utc>,
}

impl LimitChecker {
    pub fn new(limits: ExplorationLimits, max_recovery_attempts: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            limits,
            max_recovery_attempts,
            started_at,
        }
    }

    /// Returns `None` while every limit holds, otherwise the first one hit.
    /// Recovery exhaustion is checked first since it ends the run in error.
    pub fn check(&self, now: DateTime<Utc>, usage: RunUsage) -> Option<StopReason> {
        if usage.recovery_attempts > self.max_recovery_attempts {
            return Some(StopReason::RecoveryAttemptsExceeded);
        }
        if self.duration_exceeded(now) {
            return Some(StopReason::DurationExceeded);
        }
        if usage.screens >= self.limits.max_screens as usize {
            return Some(StopReason::ScreenLimitReached);
        }
        if usage.elements >= self.limits.max_elements as usize {
            return Some(StopReason::ElementLimitReached);
        }
        None
    }

    /// Check only the wall-time limit.
    pub fn duration_exceeded(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_secs(now) >= self.limits.max_duration_secs as f64
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    pub fn limits(&self) -> &ExplorationLimits {
        &self.limits
    }
}
