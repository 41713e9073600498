//! The run session: what a driver loop talks to.
//!
//! The driver captures a screen, reports it with [`ExplorationSession::on_capture`],
//! asks [`ExplorationSession::next_decision`] what to do, dispatches the
//! gesture, reports the outcome, and repeats. Status readers may call
//! [`ExplorationSession::snapshot`] from other threads at any time.
//!
//! Locks are always taken in the order state, pending, analytics.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use screenwalk_explore::{
    ActionOutcome, ConfigError, CorrectionAction, ExplorationConfig, ExplorationState, ExplorationStatus,
    ExplorationTarget, Planner, PlannerDecision, QValueScorer, StateError, StopReason, TargetKind,
    TimedScorer,
};
use screenwalk_graph::PathStep;
use screenwalk_ident::{ScreenDescriptor, ScreenId, UiElement};
use tracing::{debug, info, warn};

use crate::analytics::RunAnalytics;
use crate::report::ExplorationReport;
use crate::snapshot::RunSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no executed action is awaiting a result")]
    NoPendingAction,

    #[error("exploration already ended ({0:?})")]
    Finished(ExplorationStatus),

    #[error("session lock poisoned")]
    LockPoisoned,
}

/// Work handed to the driver whose outcome is not yet known.
#[derive(Debug, Default)]
struct Pending {
    /// Last `Execute` target, until `report_action`.
    action: Option<ExplorationTarget>,
    /// A tap whose destination is the next capture.
    transition: Option<(ScreenId, String)>,
    /// Target of the current `Navigate`, until its screen is captured.
    navigation: Option<ExplorationTarget>,
}

pub struct ExplorationSession {
    planner: Planner,
    state: Mutex<ExplorationState>,
    pending: Mutex<Pending>,
    analytics: Mutex<RunAnalytics>,
}

impl ExplorationSession {
    pub fn new(target_package: &str, config: ExplorationConfig) -> Result<Self, SessionError> {
        Self::with_state(ExplorationState::new(target_package), config)
    }

    /// Continue a run saved with [`save_state`](Self::save_state).
    pub fn restore(state_json: &str, config: ExplorationConfig) -> Result<Self, SessionError> {
        Self::with_state(ExplorationState::from_json(state_json)?, config)
    }

    fn with_state(state: ExplorationState, config: ExplorationConfig) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            planner: Planner::new(config),
            state: Mutex::new(state),
            pending: Mutex::new(Pending::default()),
            analytics: Mutex::new(RunAnalytics::new()),
        })
    }

    /// Re-rank targets with an external scorer, bounded by `scorer_timeout_ms`.
    pub fn with_scorer(mut self, scorer: Arc<dyn QValueScorer>) -> Self {
        let timeout = Duration::from_millis(self.planner.config().scorer_timeout_ms);
        self.planner = self.planner.with_scorer(TimedScorer::new(scorer, timeout));
        self
    }

    pub fn config(&self) -> &ExplorationConfig {
        self.planner.config()
    }

    pub fn start(&self, now: DateTime<Utc>) -> Result<(), SessionError> {
        lock(&self.state)?.start(now)?;
        Ok(())
    }

    pub fn status(&self) -> Result<ExplorationStatus, SessionError> {
        Ok(lock(&self.state)?.status())
    }

    /// Record a capture. A preceding tap becomes a transition into it.
    pub fn on_capture(&self, descriptor: &ScreenDescriptor, now: DateTime<Utc>) -> Result<ScreenId, SessionError> {
        let mut state = lock(&self.state)?;
        if state.status().is_terminal() {
            return Err(SessionError::Finished(state.status()));
        }
        let mut pending = lock(&self.pending)?;

        let screen_id = state.record_screen(descriptor, now);
        state.record_reach_success(&screen_id);

        if let Some((from, element_id)) = pending.transition.take() {
            let outcome = state.record_transition(&from, &element_id, &screen_id, Some(&descriptor.activity));
            if outcome.conditional && outcome.new_destination {
                info!(screen = %from, element = %element_id, "element leads to more than one screen");
            }
        }

        if pending
            .navigation
            .as_ref()
            .is_some_and(|target| target.screen_id == screen_id)
        {
            if let Some(target) = pending.navigation.take() {
                debug!(screen = %screen_id, "navigation target reached");
                state.enqueue(target);
            }
        }

        self.planner.enqueue_targets(&mut state, &screen_id);

        let coverage = self.planner.coverage(&state);
        lock(&self.analytics)?.record_coverage(state.pass_number(), &coverage);
        Ok(screen_id)
    }

    /// Ask the planner for the next step. A `Stop` decision ends the run.
    pub fn next_decision(&self, now: DateTime<Utc>) -> Result<PlannerDecision, SessionError> {
        let mut state = lock(&self.state)?;
        let mut pending = lock(&self.pending)?;

        let decision = self.planner.next_action(&mut state, now);
        match &decision {
            PlannerDecision::Execute(target) => {
                pending.action = Some(target.clone());
            }
            PlannerDecision::Navigate { target, path } => {
                debug!(to = %target.screen_id, hops = path.len(), "navigating");
                pending.navigation = Some(target.clone());
            }
            PlannerDecision::Stop(reason) => {
                if !state.status().is_terminal() {
                    state.finish(*reason)?;
                }
            }
            PlannerDecision::NextPass | PlannerDecision::Paused => {}
        }

        if let Some(started) = state.started_at() {
            lock(&self.analytics)?.set_elapsed(elapsed_secs(started, now));
        }
        Ok(decision)
    }

    /// Outcome of the last `Execute` target.
    pub fn report_action(&self, success: bool, now: DateTime<Utc>) -> Result<(), SessionError> {
        let mut state = lock(&self.state)?;
        let mut pending = lock(&self.pending)?;
        let target = pending.action.take().ok_or(SessionError::NoPendingAction)?;
        let config = self.planner.config();

        match (target.kind, target.element_id.as_deref()) {
            (TargetKind::TapElement, Some(element_id)) => {
                let element = state
                    .screen(&target.screen_id)
                    .and_then(|screen| screen.element(element_id))
                    .cloned();
                if success {
                    if let Some(element) = element.as_ref().filter(|e| e.checkable) {
                        state.record_toggle(&target.screen_id, element, now);
                    }
                    pending.transition = Some((target.screen_id.clone(), element_id.to_string()));
                }
                let outcome =
                    state.record_action_result(&target.screen_id, element_id, success, config.max_element_retries);
                if matches!(outcome, ActionOutcome::WillRetry { .. }) {
                    state.enqueue(target.clone());
                }
            }
            (TargetKind::ScrollContainer, Some(container_id)) => {
                let max_scrolls = config.effective_limits().max_scrolls_per_container;
                state.record_scroll_result(&target.screen_id, container_id, success, max_scrolls);
            }
            _ => {}
        }

        lock(&self.analytics)?.record_action(success);
        Ok(())
    }

    /// The driver is about to tap one hop of a planned path.
    pub fn report_path_step(&self, step: &PathStep) -> Result<(), SessionError> {
        lock(&self.pending)?.transition = Some((step.screen.clone(), step.element_id.clone()));
        lock(&self.analytics)?.record_action(true);
        Ok(())
    }

    /// The driver finished walking a path. Returns whether the target screen
    /// was reached; if not, the miss counts toward making it unreachable and
    /// the target is queued again.
    pub fn complete_navigation(&self) -> Result<bool, SessionError> {
        let mut state = lock(&self.state)?;
        let mut pending = lock(&self.pending)?;
        let Some(target) = pending.navigation.take() else {
            return Ok(true);
        };

        warn!(target = %target.screen_id, current = ?state.current_screen(), "navigation missed its target");
        let max_failures = self.planner.config().max_screen_reach_failures;
        state.record_reach_failure(&target.screen_id, max_failures);
        if !state.is_unreachable(&target.screen_id) {
            state.enqueue(target);
        }
        Ok(false)
    }

    /// The target app lost the foreground. The tap that caused it, if any, is
    /// learned as dangerous. `relaunched` says whether recovery succeeded.
    pub fn report_app_left(&self, foreground_package: &str, relaunched: bool) -> Result<u64, SessionError> {
        let mut state = lock(&self.state)?;
        let mut pending = lock(&self.pending)?;

        let culprit = pending.transition.take().or_else(|| {
            pending
                .action
                .take()
                .and_then(|t| t.element_id.map(|element_id| (t.screen_id, element_id)))
        });
        pending.navigation = None;

        let element_id = culprit.as_ref().map(|(_, id)| id.clone());
        let issue = state.record_app_left(foreground_package, element_id.as_deref());

        if let Some((screen_id, element_id)) = culprit {
            let element = state
                .screen(&screen_id)
                .and_then(|screen| screen.element(&element_id))
                .cloned();
            if let Some(element) = element {
                state.learn_dangerous_element(Some(&screen_id), &element);
            }
        }

        let attempts = state.record_recovery_attempt(relaunched);
        info!(attempts, relaunched, "recovery attempted");
        Ok(issue)
    }

    /// Remember a toggle's value before the driver flips it outside a planned
    /// target. Returns false when already recorded or no screen is current.
    pub fn record_toggle(&self, element: &UiElement, now: DateTime<Utc>) -> Result<bool, SessionError> {
        let mut state = lock(&self.state)?;
        let Some(screen_id) = state.current_screen().cloned() else {
            return Ok(false);
        };
        Ok(state.record_toggle(&screen_id, element, now))
    }

    pub fn apply_correction(&self, issue_id: u64, action: CorrectionAction) -> Result<(), SessionError> {
        lock(&self.state)?.apply_correction(issue_id, action)?;
        Ok(())
    }

    pub fn pause(&self) -> Result<(), SessionError> {
        lock(&self.state)?.pause()?;
        Ok(())
    }

    pub fn resume(&self) -> Result<(), SessionError> {
        lock(&self.state)?.resume()?;
        Ok(())
    }

    pub fn cancel(&self) -> Result<(), SessionError> {
        lock(&self.state)?.cancel()?;
        Ok(())
    }

    /// Close the current pass and start the next one on the current screen.
    pub fn begin_next_pass(&self) -> Result<u32, SessionError> {
        let mut state = lock(&self.state)?;
        let mut pending = lock(&self.pending)?;

        let coverage = self.planner.coverage(&state);
        let transitions = state.graph().stats().transitions;
        lock(&self.analytics)?.end_pass(state.pass_number(), &coverage, transitions);

        *pending = Pending::default();
        let pass = state.start_next_pass();
        if let Some(current) = state.current_screen().cloned() {
            self.planner.enqueue_targets(&mut state, &current);
        }
        Ok(pass)
    }

    /// End the run and export it. A run still in progress is cancelled.
    /// In non-destructive mode the undo log is drained into the report.
    pub fn finish(&self, now: DateTime<Utc>) -> Result<ExplorationReport, SessionError> {
        let mut state = lock(&self.state)?;
        if !state.status().is_terminal() {
            state.finish(StopReason::UserCancelled)?;
        }

        let undo = if self.planner.config().non_destructive {
            state.take_undo_log()
        } else {
            Vec::new()
        };
        let coverage = self.planner.coverage(&state);

        let mut analytics = lock(&self.analytics)?;
        if analytics.passes.last().map(|p| p.pass) != Some(state.pass_number()) {
            analytics.end_pass(state.pass_number(), &coverage, state.graph().stats().transitions);
        }
        if let Some(started) = state.started_at() {
            analytics.set_elapsed(elapsed_secs(started, now));
        }

        info!(
            status = ?state.status(),
            screens = state.screens().len(),
            coverage = coverage.overall_coverage,
            undo = undo.len(),
            "exploration finished"
        );
        Ok(ExplorationReport::build(&state, coverage, analytics.clone(), undo, now))
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Result<RunSnapshot, SessionError> {
        let state = lock(&self.state)?;
        let coverage = self.planner.coverage(&state);
        let analytics = lock(&self.analytics)?;
        Ok(RunSnapshot::capture(&state, coverage, &analytics, now))
    }

    pub fn save_state(&self) -> Result<String, SessionError> {
        Ok(lock(&self.state)?.to_json()?)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, SessionError> {
    mutex.lock().map_err(|_| SessionError::LockPoisoned)
}

fn elapsed_secs(started: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - started).num_milliseconds().max(0) as f64 / 1000.0
}
