//! The exploration aggregate and its status machine.
//!
//! [`ExplorationState`] owns everything a run accumulates: discovered screens,
//! the navigation graph, the target queue, retry bookkeeping, the issue log,
//! the undo log and cumulative candidates. The planner reads it; the driver
//! feeds it through the recording methods below. All of it round-trips through
//! JSON so a run can be resumed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use screenwalk_graph::{GraphError, NavigationGraph, RecordedTransition};
use screenwalk_ident::{Bounds, ScreenDescriptor, ScreenId, UiElement};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::candidate::{collect_candidates, merge_by_element_id, ActionCandidate, SensorCandidate};
use crate::issue::{CorrectionAction, CorrectionError, IssueContext, IssueLog, IssueType};
use crate::limits::{RunUsage, StopReason};
use crate::retry::{FailureTracker, FailureVerdict};
use crate::target::{ExplorationTarget, TargetQueue};

/// Priority given to operator-demonstrated targets.
pub const DEMONSTRATION_PRIORITY: i32 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("illegal status transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: ExplorationStatus,
        to: ExplorationStatus,
    },

    #[error("exploration is not running (status {0:?})")]
    NotRunning(ExplorationStatus),

    #[error(transparent)]
    Correction(#[from] CorrectionError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExplorationStatus {
    #[default]
    NotStarted,
    InProgress,
    Paused,
    Completed,
    Stopped,
    Cancelled,
    Error,
}

impl ExplorationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Cancelled | Self::Error)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use ExplorationStatus::*;
        match self {
            NotStarted => matches!(next, InProgress | Cancelled),
            InProgress => matches!(next, Paused | Completed | Stopped | Cancelled | Error),
            Paused => matches!(next, InProgress | Stopped | Cancelled | Error),
            Completed | Stopped | Cancelled | Error => false,
        }
    }

    /// Terminal status a run ends in for a given stop reason.
    pub fn for_stop(reason: StopReason) -> Self {
        match reason {
            r if r.is_natural() => Self::Completed,
            StopReason::UserCancelled => Self::Cancelled,
            StopReason::RecoveryAttemptsExceeded => Self::Error,
            _ => Self::Stopped,
        }
    }
}

/// A discovered screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub screen_id: ScreenId,
    pub package_name: String,
    pub activity: String,
    /// Union of every element seen across captures, first sighting wins.
    pub elements: Vec<UiElement>,
    pub visit_count: u32,
    pub first_captured: DateTime<Utc>,
    pub last_captured: DateTime<Utc>,
    /// Hops from the entry screen along the shallowest observed route.
    pub depth: u32,
}

impl Screen {
    pub fn actionable_elements(&self) -> impl Iterator<Item = &UiElement> {
        self.elements.iter().filter(|e| e.is_actionable())
    }

    pub fn scroll_containers(&self) -> impl Iterator<Item = &UiElement> {
        self.elements.iter().filter(|e| e.scrollable)
    }

    pub fn element(&self, element_id: &str) -> Option<&UiElement> {
        self.elements.iter().find(|e| e.element_id == element_id)
    }

    fn merge_elements(&mut self, captured: &[UiElement]) -> usize {
        let before = self.elements.len();
        for element in captured {
            if self.element(&element.element_id).is_none() {
                self.elements.push(element.clone());
            }
        }
        self.elements.len() - before
    }
}

/// A toggle flipped during exploration, with the value to restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleRecord {
    pub screen_id: ScreenId,
    pub element_id: String,
    pub original_checked: bool,
    pub bounds: Bounds,
    pub recorded_at: DateTime<Utc>,
}

/// What happened to an executed tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    /// Failed; will be offered again.
    WillRetry { attempt: u32 },
    /// Failed too often and was abandoned.
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationState {
    target_package: String,
    status: ExplorationStatus,
    stop_reason: Option<StopReason>,
    started_at: Option<DateTime<Utc>>,
    pass_number: u32,
    screens: BTreeMap<ScreenId, Screen>,
    entry_screen: Option<ScreenId>,
    current_screen: Option<ScreenId>,
    queue: TargetQueue,
    visited_elements: BTreeSet<String>,
    scroll_counts: BTreeMap<String, u32>,
    fully_scrolled: BTreeSet<String>,
    graph: NavigationGraph,
    issues: IssueLog,
    element_retries: FailureTracker<String>,
    reach_failures: FailureTracker<ScreenId>,
    dangerous_patterns: BTreeSet<String>,
    recovery_attempts: u32,
    undo_log: Vec<ToggleRecord>,
    sensor_candidates: Vec<SensorCandidate>,
    action_candidates: Vec<ActionCandidate>,
    /// Distinct elements tapped successfully, summed over passes.
    elements_acted: usize,
    /// Gestures dispatched, including failures.
    actions_performed: u64,
}

impl ExplorationState {
    pub fn new(target_package: &str) -> Self {
        Self {
            target_package: target_package.to_string(),
            status: ExplorationStatus::NotStarted,
            stop_reason: None,
            started_at: None,
            pass_number: 1,
            screens: BTreeMap::new(),
            entry_screen: None,
            current_screen: None,
            queue: TargetQueue::new(),
            visited_elements: BTreeSet::new(),
            scroll_counts: BTreeMap::new(),
            fully_scrolled: BTreeSet::new(),
            graph: NavigationGraph::new(),
            issues: IssueLog::new(),
            element_retries: FailureTracker::new(),
            reach_failures: FailureTracker::new(),
            dangerous_patterns: BTreeSet::new(),
            recovery_attempts: 0,
            undo_log: Vec::new(),
            sensor_candidates: Vec::new(),
            action_candidates: Vec::new(),
            elements_acted: 0,
            actions_performed: 0,
        }
    }

    // ── Status machine ───────────────────────────────────────────────

    fn transition(&mut self, next: ExplorationStatus) -> Result<(), StateError> {
        if !self.status.can_transition_to(next) {
            return Err(StateError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        info!(from = ?self.status, to = ?next, package = %self.target_package, "exploration status changed");
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), StateError> {
        self.transition(ExplorationStatus::InProgress)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), StateError> {
        self.transition(ExplorationStatus::Paused)
    }

    pub fn resume(&mut self) -> Result<(), StateError> {
        if self.status != ExplorationStatus::Paused {
            return Err(StateError::IllegalTransition {
                from: self.status,
                to: ExplorationStatus::InProgress,
            });
        }
        self.transition(ExplorationStatus::InProgress)
    }

    pub fn cancel(&mut self) -> Result<(), StateError> {
        self.finish(StopReason::UserCancelled)
    }

    /// Move to the terminal status matching `reason`.
    pub fn finish(&mut self, reason: StopReason) -> Result<(), StateError> {
        self.transition(ExplorationStatus::for_stop(reason))?;
        self.stop_reason = Some(reason);
        Ok(())
    }

    pub fn status(&self) -> ExplorationStatus {
        self.status
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn is_running(&self) -> bool {
        self.status == ExplorationStatus::InProgress
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn target_package(&self) -> &str {
        &self.target_package
    }

    // ── Screens and transitions ──────────────────────────────────────

    /// Record a capture and make it the current screen. New screens get a
    /// depth one below the screen they were reached from.
    pub fn record_screen(&mut self, descriptor: &ScreenDescriptor, now: DateTime<Utc>) -> ScreenId {
        let screen_id = descriptor.screen_id();
        let reached_depth = self
            .current_screen
            .as_ref()
            .filter(|current| **current != screen_id)
            .and_then(|current| self.screens.get(current))
            .map_or(0, |parent| parent.depth + 1);

        match self.screens.get_mut(&screen_id) {
            Some(screen) => {
                screen.visit_count += 1;
                screen.last_captured = now;
                screen.depth = screen.depth.min(reached_depth);
                let added = screen.merge_elements(&descriptor.elements);
                if added > 0 {
                    debug!(screen = %screen_id, added, "new elements on known screen");
                }
            }
            None => {
                info!(
                    screen = %screen_id,
                    activity = %descriptor.activity,
                    depth = reached_depth,
                    elements = descriptor.elements.len(),
                    "screen discovered"
                );
                self.screens.insert(
                    screen_id.clone(),
                    Screen {
                        screen_id: screen_id.clone(),
                        package_name: descriptor.package_name.clone(),
                        activity: descriptor.activity.clone(),
                        elements: descriptor.elements.clone(),
                        visit_count: 1,
                        first_captured: now,
                        last_captured: now,
                        depth: reached_depth,
                    },
                );
            }
        }

        self.graph.add_screen(&screen_id);
        if self.entry_screen.is_none() {
            self.entry_screen = Some(screen_id.clone());
        }
        self.current_screen = Some(screen_id.clone());

        let (sensors, actions) = collect_candidates(&screen_id, &descriptor.elements);
        self.merge_candidates(sensors, actions);
        self.refresh_screen_completion(&screen_id);
        screen_id
    }

    /// Record a tap outcome in the graph. A newly seen blocker destination is
    /// logged as an issue.
    pub fn record_transition(
        &mut self,
        from: &ScreenId,
        element_id: &str,
        to: &ScreenId,
        to_activity: Option<&str>,
    ) -> RecordedTransition {
        let outcome = self.graph.record_transition(from, element_id, to, to_activity);
        if outcome.blocker && outcome.new_destination {
            let context = self.context_for(from, element_id);
            self.issues.record(
                IssueType::BlockerEncountered,
                Some(to),
                context,
                format!("{element_id} leads to a blocker screen ({})", to_activity.unwrap_or("unknown")),
            );
        }
        outcome
    }

    pub fn screens(&self) -> &BTreeMap<ScreenId, Screen> {
        &self.screens
    }

    pub fn screen(&self, screen_id: &ScreenId) -> Option<&Screen> {
        self.screens.get(screen_id)
    }

    pub fn entry_screen(&self) -> Option<&ScreenId> {
        self.entry_screen.as_ref()
    }

    pub fn current_screen(&self) -> Option<&ScreenId> {
        self.current_screen.as_ref()
    }

    pub fn graph(&self) -> &NavigationGraph {
        &self.graph
    }

    /// Screens the planner may generate work on.
    pub fn is_explorable(&self, screen_id: &ScreenId) -> bool {
        !self.graph.is_blocker_screen(screen_id)
            && !self.graph.is_problematic_screen(screen_id)
            && !self.reach_failures.is_abandoned(screen_id)
    }

    /// Unvisited actionable elements plus unscrolled containers on a screen.
    pub fn unvisited_work(&self, screen_id: &ScreenId) -> usize {
        let Some(screen) = self.screens.get(screen_id) else {
            return 0;
        };
        let taps = screen
            .actionable_elements()
            .filter(|e| !self.visited_elements.contains(&e.element_id))
            .count();
        let scrolls = screen
            .scroll_containers()
            .filter(|e| !self.fully_scrolled.contains(&e.element_id))
            .count();
        taps + scrolls
    }

    /// Mark a screen fully explored once nothing on it is left.
    pub fn refresh_screen_completion(&mut self, screen_id: &ScreenId) -> bool {
        if self.graph.is_fully_explored(screen_id) || !self.screens.contains_key(screen_id) {
            return false;
        }
        if self.unvisited_work(screen_id) == 0 {
            debug!(screen = %screen_id, "screen fully explored");
            self.graph.mark_fully_explored(screen_id);
            return true;
        }
        false
    }

    // ── Queue ────────────────────────────────────────────────────────

    /// Enqueue unless the same work is already pending.
    pub fn enqueue(&mut self, target: ExplorationTarget) -> bool {
        if self.queue.contains_work(&target) {
            return false;
        }
        self.queue.push(target);
        true
    }

    pub fn pop_target(&mut self) -> Option<ExplorationTarget> {
        self.queue.pop()
    }

    /// Best queued target on `screen`, if any.
    pub fn pop_target_on(&mut self, screen: &ScreenId) -> Option<ExplorationTarget> {
        self.queue.pop_matching(|target| &target.screen_id == screen)
    }

    pub fn queue(&self) -> &TargetQueue {
        &self.queue
    }

    // ── Elements ─────────────────────────────────────────────────────

    pub fn mark_element_visited(&mut self, element_id: &str) -> bool {
        self.visited_elements.insert(element_id.to_string())
    }

    pub fn is_element_visited(&self, element_id: &str) -> bool {
        self.visited_elements.contains(element_id)
    }

    pub fn visited_elements(&self) -> &BTreeSet<String> {
        &self.visited_elements
    }

    pub fn is_element_abandoned(&self, element_id: &str) -> bool {
        self.element_retries.is_abandoned(&element_id.to_string())
    }

    /// Record the outcome of a tap. Failures are retried up to
    /// `max_retries` times, after which the element is abandoned (marked
    /// visited) and a `StuckElement` issue is logged.
    pub fn record_action_result(
        &mut self,
        screen_id: &ScreenId,
        element_id: &str,
        success: bool,
        max_retries: u32,
    ) -> ActionOutcome {
        self.actions_performed += 1;
        let key = element_id.to_string();

        if success {
            self.element_retries.record_success(&key);
            if self.mark_element_visited(element_id) {
                self.elements_acted += 1;
            }
            self.refresh_screen_completion(screen_id);
            return ActionOutcome::Succeeded;
        }

        match self.element_retries.record_failure(&key, max_retries) {
            FailureVerdict::Retry { attempt } => {
                debug!(screen = %screen_id, element = element_id, attempt, "tap failed, will retry");
                ActionOutcome::WillRetry { attempt }
            }
            FailureVerdict::GiveUp { attempts } => {
                warn!(screen = %screen_id, element = element_id, attempts, "element abandoned");
                let context = self.context_for(screen_id, element_id);
                self.issues.record(
                    IssueType::StuckElement,
                    Some(screen_id),
                    context,
                    format!("tap failed {attempts} times"),
                );
                self.mark_element_visited(element_id);
                self.refresh_screen_completion(screen_id);
                ActionOutcome::Abandoned
            }
            FailureVerdict::AlreadyAbandoned => ActionOutcome::Abandoned,
        }
    }

    /// Record a scroll of `container_id`. The container counts as fully
    /// scrolled after `max_scrolls` successful scrolls or any failure.
    pub fn record_scroll_result(
        &mut self,
        screen_id: &ScreenId,
        container_id: &str,
        success: bool,
        max_scrolls: u32,
    ) -> bool {
        self.actions_performed += 1;
        if !success {
            let context = self.context_for(screen_id, container_id);
            self.issues.record(IssueType::ScrollFailed, Some(screen_id), context, "scroll had no effect");
            self.fully_scrolled.insert(container_id.to_string());
            self.refresh_screen_completion(screen_id);
            return true;
        }

        let count = self.scroll_counts.entry(container_id.to_string()).or_insert(0);
        *count += 1;
        let done = *count >= max_scrolls;
        if done {
            self.fully_scrolled.insert(container_id.to_string());
            self.refresh_screen_completion(screen_id);
        }
        done
    }

    pub fn is_fully_scrolled(&self, container_id: &str) -> bool {
        self.fully_scrolled.contains(container_id)
    }

    pub fn fully_scrolled(&self) -> &BTreeSet<String> {
        &self.fully_scrolled
    }

    // ── Reachability ─────────────────────────────────────────────────

    /// Count a failed attempt to reach `screen_id`. Past `max_failures` the
    /// screen is excluded from planning and marked problematic.
    pub fn record_reach_failure(&mut self, screen_id: &ScreenId, max_failures: u32) -> FailureVerdict {
        let verdict = self.reach_failures.record_failure(screen_id, max_failures);
        if let FailureVerdict::GiveUp { attempts } = verdict {
            warn!(screen = %screen_id, attempts, "screen unreachable");
            self.graph
                .mark_screen_problematic(screen_id, &format!("unreachable after {attempts} attempts"));
            self.queue.retain(|t| &t.screen_id != screen_id);
        }
        verdict
    }

    pub fn record_reach_success(&mut self, screen_id: &ScreenId) {
        self.reach_failures.record_success(screen_id);
    }

    pub fn is_unreachable(&self, screen_id: &ScreenId) -> bool {
        self.reach_failures.is_abandoned(screen_id)
    }

    pub fn unreachable_screens(&self) -> &BTreeSet<ScreenId> {
        self.reach_failures.abandoned()
    }

    // ── Dangerous elements ───────────────────────────────────────────

    /// Learn identity fragments of an element that closed or minimized the
    /// app so it is never offered again.
    pub fn learn_dangerous_element(&mut self, screen_id: Option<&ScreenId>, element: &UiElement) {
        let learned = self.learn_patterns(element.resource_id.as_deref(), element.text.as_deref());
        self.mark_element_visited(&element.element_id);
        warn!(element = %element.element_id, patterns = ?learned, "dangerous element learned");
        self.issues.record(
            IssueType::DangerousElement,
            screen_id,
            IssueContext::for_element(element),
            "element closed or minimized the app",
        );
    }

    fn learn_patterns(&mut self, resource_id: Option<&str>, text: Option<&str>) -> Vec<String> {
        let mut learned = Vec::new();
        for fragment in [resource_id.and_then(resource_segment), text].into_iter().flatten() {
            let pattern = fragment.trim().to_lowercase();
            if !pattern.is_empty() && self.dangerous_patterns.insert(pattern.clone()) {
                learned.push(pattern);
            }
        }
        learned
    }

    /// A learned pattern inside the element's resource segment, or equal to
    /// its text.
    pub fn is_dangerous(&self, element: &UiElement) -> bool {
        if self.dangerous_patterns.is_empty() {
            return false;
        }
        let segment = element
            .resource_id
            .as_deref()
            .and_then(resource_segment)
            .map(str::to_lowercase);
        if let Some(segment) = segment {
            if self.dangerous_patterns.iter().any(|p| segment.contains(p.as_str())) {
                return true;
            }
        }
        element
            .text
            .as_deref()
            .is_some_and(|text| self.dangerous_patterns.contains(&text.trim().to_lowercase()))
    }

    pub fn dangerous_patterns(&self) -> &BTreeSet<String> {
        &self.dangerous_patterns
    }

    // ── Issues and recovery ──────────────────────────────────────────

    pub fn issues(&self) -> &IssueLog {
        &self.issues
    }

    pub fn record_issue(
        &mut self,
        issue_type: IssueType,
        screen_id: Option<&ScreenId>,
        context: IssueContext,
        description: impl Into<String>,
    ) -> u64 {
        self.issues.record(issue_type, screen_id, context, description)
    }

    /// The foreground app changed to `foreground_package`.
    pub fn record_app_left(&mut self, foreground_package: &str, element_id: Option<&str>) -> u64 {
        let screen = self.current_screen.clone();
        let context = match (&screen, element_id) {
            (Some(screen), Some(element)) => self.context_for(screen, element),
            (None, Some(element)) => IssueContext::for_element_id(element),
            _ => IssueContext::none(),
        };
        warn!(foreground = foreground_package, "target app left");
        self.issues.record(
            IssueType::AppLeft,
            screen.as_ref(),
            context,
            format!("foreground switched to {foreground_package}"),
        )
    }

    /// Count a relaunch of the target app. Returns the running total.
    pub fn record_recovery_attempt(&mut self, success: bool) -> u32 {
        self.recovery_attempts += 1;
        if !success {
            let screen = self.current_screen.clone();
            self.issues.record(
                IssueType::RecoveryFailed,
                screen.as_ref(),
                IssueContext::none(),
                format!("recovery attempt {} failed", self.recovery_attempts),
            );
        }
        self.recovery_attempts
    }

    pub fn recovery_attempts(&self) -> u32 {
        self.recovery_attempts
    }

    /// Attach an operator correction and act on it.
    pub fn apply_correction(&mut self, issue_id: u64, action: CorrectionAction) -> Result<(), StateError> {
        let issue = self.issues.apply_correction(issue_id, action)?.clone();
        let context = issue.context();
        let screen = issue.screen_id().or(self.current_screen.as_ref()).cloned();
        info!(issue = issue_id, ?action, "correction applied");

        match action {
            CorrectionAction::MarkIgnore => {
                if let Some(element_id) = &context.element_id {
                    self.mark_element_visited(element_id);
                }
            }
            CorrectionAction::MarkDangerous => {
                self.learn_patterns(context.resource_id.as_deref(), context.text.as_deref());
                if let Some(element_id) = &context.element_id {
                    self.mark_element_visited(element_id);
                }
            }
            CorrectionAction::DemonstrateTap { x, y } => {
                if let Some(screen) = screen {
                    let element_id = context
                        .element_id
                        .clone()
                        .unwrap_or_else(|| format!("demo_{x}_{y}"));
                    self.queue.push(ExplorationTarget::tap(
                        screen,
                        &element_id,
                        Bounds::new(x, y, x + 1, y + 1),
                        DEMONSTRATION_PRIORITY,
                    ));
                }
            }
            CorrectionAction::DemonstrateScroll { .. } => {
                if let (Some(screen), Some(container)) = (screen, &context.element_id) {
                    self.fully_scrolled.remove(container);
                    self.queue.push(ExplorationTarget::scroll(
                        screen,
                        container,
                        context.bounds.unwrap_or_default(),
                        DEMONSTRATION_PRIORITY,
                    ));
                }
            }
            CorrectionAction::Skip => {}
        }
        Ok(())
    }

    // ── Non-destructive undo log ─────────────────────────────────────

    /// Remember a toggle's original value before it is flipped. Only the
    /// first record per element is kept.
    pub fn record_toggle(&mut self, screen_id: &ScreenId, element: &UiElement, now: DateTime<Utc>) -> bool {
        if self
            .undo_log
            .iter()
            .any(|r| &r.screen_id == screen_id && r.element_id == element.element_id)
        {
            return false;
        }
        self.undo_log.push(ToggleRecord {
            screen_id: screen_id.clone(),
            element_id: element.element_id.clone(),
            original_checked: element.checked,
            bounds: element.bounds,
            recorded_at: now,
        });
        true
    }

    pub fn undo_log(&self) -> &[ToggleRecord] {
        &self.undo_log
    }

    /// Drain the undo log, most recent toggle first.
    pub fn take_undo_log(&mut self) -> Vec<ToggleRecord> {
        let mut records = std::mem::take(&mut self.undo_log);
        records.reverse();
        records
    }

    // ── Passes ───────────────────────────────────────────────────────

    pub fn pass_number(&self) -> u32 {
        self.pass_number
    }

    /// Begin another pass. Per-pass working sets are reset; screens, the
    /// graph's transitions, issues, unreachable screens, dangerous patterns
    /// and candidates carry over.
    pub fn start_next_pass(&mut self) -> u32 {
        self.pass_number += 1;
        self.visited_elements.clear();
        self.scroll_counts.clear();
        self.fully_scrolled.clear();
        self.queue.clear();
        self.element_retries.clear();
        self.graph.reset_exploration_marks();
        info!(pass = self.pass_number, screens = self.screens.len(), "starting pass");
        self.pass_number
    }

    pub fn merge_candidates(
        &mut self,
        sensors: impl IntoIterator<Item = SensorCandidate>,
        actions: impl IntoIterator<Item = ActionCandidate>,
    ) -> usize {
        merge_by_element_id(&mut self.sensor_candidates, sensors)
            + merge_by_element_id(&mut self.action_candidates, actions)
    }

    pub fn sensor_candidates(&self) -> &[SensorCandidate] {
        &self.sensor_candidates
    }

    pub fn action_candidates(&self) -> &[ActionCandidate] {
        &self.action_candidates
    }

    // ── Accounting ───────────────────────────────────────────────────

    pub fn usage(&self) -> RunUsage {
        RunUsage {
            screens: self.screens.len(),
            elements: self.elements_acted,
            recovery_attempts: self.recovery_attempts,
        }
    }

    pub fn actions_performed(&self) -> u64 {
        self.actions_performed
    }

    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a saved state, checking the embedded graph.
    pub fn from_json(json: &str) -> Result<Self, StateError> {
        let state: Self = serde_json::from_str(json)?;
        state.graph.validate()?;
        Ok(state)
    }

    fn context_for(&self, screen_id: &ScreenId, element_id: &str) -> IssueContext {
        self.screens
            .get(screen_id)
            .and_then(|s| s.element(element_id))
            .map_or_else(|| IssueContext::for_element_id(element_id), IssueContext::for_element)
    }
}

fn resource_segment(resource_id: &str) -> Option<&str> {
    resource_id.rsplit('/').next().filter(|s| !s.is_empty())
}
