//! Target generation and next-step decisions.
//!
//! The planner is stateless apart from its configuration: every decision is
//! derived from the [`ExplorationState`] it is handed. Paths always come from
//! the reliability-weighted query, never the hop-count one.

use chrono::{DateTime, Utc};
use screenwalk_graph::PathStep;
use screenwalk_ident::{ScreenId, UiElement};
use tracing::{debug, info};

use crate::coverage::{CoverageMetrics, CoverageTracker};
use crate::goal::ExplorationConfig;
use crate::limits::{LimitChecker, StopReason};
use crate::oracle::TimedScorer;
use crate::state::{ExplorationState, Screen};
use crate::target::{ExplorationTarget, TargetKind};

const BASE_PRIORITY: i32 = 50;
const TEXT_BONUS: i32 = 20;
const RESOURCE_ID_BONUS: i32 = 10;
const TOGGLE_PENALTY: i32 = 30;
const EXIT_PENALTY: i32 = 40;
const SCROLL_PRIORITY: i32 = 30;
const BACKTRACK_PRIORITY: i32 = 20;
/// Scorer output in [0, 1] adds up to this much priority.
const SCORE_WEIGHT: f64 = 50.0;

const EXIT_WORDS: &[&str] = &["back", "close", "exit", "logout", "log out", "sign out", "cancel"];

#[derive(Debug, Clone, PartialEq)]
pub enum PlannerDecision {
    /// Perform the target on the current screen.
    Execute(ExplorationTarget),
    /// Walk `path` first; the target is for the screen at its end.
    Navigate {
        target: ExplorationTarget,
        path: Vec<PathStep>,
    },
    /// This pass has nothing left; another pass is allowed.
    NextPass,
    /// Not running right now.
    Paused,
    Stop(StopReason),
}

#[derive(Debug)]
pub struct Planner {
    config: ExplorationConfig,
    tracker: CoverageTracker,
    scorer: Option<TimedScorer>,
}

impl Planner {
    pub fn new(config: ExplorationConfig) -> Self {
        Self {
            config,
            tracker: CoverageTracker::default(),
            scorer: None,
        }
    }

    pub fn with_scorer(mut self, scorer: TimedScorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_tracker(mut self, tracker: CoverageTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn config(&self) -> &ExplorationConfig {
        &self.config
    }

    pub fn coverage(&self, state: &ExplorationState) -> CoverageMetrics {
        self.tracker.compute_within(state, |screen| self.in_scope(state, screen))
    }

    /// Targets a screen would get right now, without touching the state.
    pub fn candidate_targets(&self, state: &ExplorationState, screen_id: &ScreenId) -> Vec<ExplorationTarget> {
        let Some(screen) = state.screen(screen_id) else {
            return Vec::new();
        };
        if !state.is_explorable(screen_id) || !self.in_scope(state, screen) {
            return Vec::new();
        }

        let mut taps: Vec<&UiElement> = Vec::new();
        let mut targets = Vec::new();
        for element in &screen.elements {
            if element.is_actionable() && self.is_eligible_tap(state, element) {
                taps.push(element);
            }
            if element.scrollable && !state.is_fully_scrolled(&element.element_id) {
                targets.push(ExplorationTarget::scroll(
                    screen_id.clone(),
                    &element.element_id,
                    element.bounds,
                    SCROLL_PRIORITY,
                ));
            }
        }

        let scores = match &self.scorer {
            Some(scorer) if !taps.is_empty() => {
                let batch: Vec<UiElement> = taps.iter().map(|e| (*e).clone()).collect();
                scorer.score(screen_id, &batch)
            }
            _ => None,
        };

        for (i, element) in taps.iter().enumerate() {
            let mut priority = rule_priority(element);
            if let Some(score) = scores.as_ref().and_then(|s| s.get(i)) {
                priority += (score * SCORE_WEIGHT).round() as i32;
            }
            targets.push(ExplorationTarget::tap(
                screen_id.clone(),
                &element.element_id,
                element.bounds,
                priority,
            ));
        }

        targets.retain(|t| !state.queue().contains_work(t));
        targets
    }

    /// Screens the planner will generate work for: the target app's own,
    /// not excluded, and shallower than the depth limit.
    fn in_scope(&self, state: &ExplorationState, screen: &Screen) -> bool {
        screen.package_name == state.target_package()
            && !self.config.is_package_excluded(&screen.package_name)
            && screen.depth < self.config.effective_limits().max_depth
    }

    fn is_eligible_tap(&self, state: &ExplorationState, element: &UiElement) -> bool {
        !state.is_element_visited(&element.element_id)
            && !state.is_element_abandoned(&element.element_id)
            && !state.is_dangerous(element)
            && !element
                .resource_id
                .as_deref()
                .is_some_and(|r| self.config.is_resource_excluded(r))
    }

    /// Replenish the queue from a captured screen. Dangerous and excluded
    /// elements are marked visited so they stop counting as open work.
    pub fn enqueue_targets(&self, state: &mut ExplorationState, screen_id: &ScreenId) -> usize {
        let skipped: Vec<String> = state
            .screen(screen_id)
            .map(|screen| {
                screen
                    .actionable_elements()
                    .filter(|e| !state.is_element_visited(&e.element_id))
                    .filter(|e| {
                        state.is_dangerous(e)
                            || e.resource_id
                                .as_deref()
                                .is_some_and(|r| self.config.is_resource_excluded(r))
                    })
                    .map(|e| e.element_id.clone())
                    .collect()
            })
            .unwrap_or_default();
        for element_id in &skipped {
            debug!(screen = %screen_id, element = %element_id, "skipping filtered element");
            state.mark_element_visited(element_id);
        }
        if !skipped.is_empty() {
            state.refresh_screen_completion(screen_id);
        }

        let targets = self.candidate_targets(state, screen_id);
        let mut added = 0;
        for target in targets {
            if state.enqueue(target) {
                added += 1;
            }
        }
        if added > 0 {
            debug!(screen = %screen_id, added, queued = state.queue().len(), "targets enqueued");
        }
        added
    }

    /// Decide what the driver should do next.
    pub fn next_action(&self, state: &mut ExplorationState, now: DateTime<Utc>) -> PlannerDecision {
        if state.status().is_terminal() {
            return PlannerDecision::Stop(state.stop_reason().unwrap_or(StopReason::ExplorationExhausted));
        }
        if !state.is_running() {
            return PlannerDecision::Paused;
        }

        let checker = LimitChecker::new(
            self.config.effective_limits(),
            self.config.max_recovery_attempts,
            state.started_at().unwrap_or(now),
        );
        if let Some(reason) = checker.check(now, state.usage()) {
            info!(?reason, "run limit reached");
            return PlannerDecision::Stop(reason);
        }

        let metrics = self.coverage(state);
        if self.config.goal.stops_on_coverage()
            && self.config.stop_at_target_coverage
            && metrics.is_complete(self.config.coverage_target)
        {
            info!(coverage = metrics.overall_coverage, "coverage target reached");
            return PlannerDecision::Stop(StopReason::CoverageTargetReached);
        }

        let mut refilled = false;
        loop {
            if let Some(decision) = self.pop_next(state) {
                return decision;
            }
            if refilled {
                break;
            }
            refilled = true;
            if !self.refill(state, &metrics) {
                break;
            }
        }

        let pass = state.pass_number();
        if self.config.max_passes == 0 || pass < self.config.max_passes {
            let metrics = self.coverage(state);
            if self.config.stop_at_target_coverage && metrics.is_complete(self.config.coverage_target) {
                info!(pass, coverage = metrics.overall_coverage, "coverage target reached at pass end");
                return PlannerDecision::Stop(StopReason::CoverageTargetReached);
            }
            info!(pass, coverage = metrics.overall_coverage, "pass exhausted");
            return PlannerDecision::NextPass;
        }
        let reason = if self.config.max_passes > 1 {
            StopReason::PassLimitReached
        } else {
            StopReason::ExplorationExhausted
        };
        PlannerDecision::Stop(reason)
    }

    /// Pop until a target that is still worth doing turns up. Work on the
    /// current screen goes first; only then is anything navigated to.
    fn pop_next(&self, state: &mut ExplorationState) -> Option<PlannerDecision> {
        loop {
            let target = match state.current_screen().cloned() {
                Some(current) => state
                    .pop_target_on(&current)
                    .or_else(|| state.pop_target())?,
                None => state.pop_target()?,
            };
            if self.is_stale(state, &target) {
                continue;
            }
            let Some(current) = state.current_screen().cloned() else {
                return Some(PlannerDecision::Execute(target));
            };

            if target.screen_id == current {
                if target.kind == TargetKind::NavigateToScreen {
                    self.enqueue_targets(state, &current);
                    continue;
                }
                return Some(PlannerDecision::Execute(target));
            }

            match state
                .graph()
                .find_optimal_path_avoiding(&current, &target.screen_id, state.unreachable_screens())
            {
                Some(path) => return Some(PlannerDecision::Navigate { target, path }),
                None => {
                    debug!(from = %current, to = %target.screen_id, "no known path");
                    state.record_reach_failure(&target.screen_id, self.config.max_screen_reach_failures);
                }
            }
        }
    }

    fn is_stale(&self, state: &ExplorationState, target: &ExplorationTarget) -> bool {
        if state.is_unreachable(&target.screen_id) {
            return true;
        }
        match (target.kind, target.element_id.as_deref()) {
            (TargetKind::TapElement, Some(id)) => state.is_element_visited(id) || state.is_element_abandoned(id),
            (TargetKind::ScrollContainer, Some(id)) => state.is_fully_scrolled(id),
            _ => false,
        }
    }

    /// Try to find more work for this pass. Returns whether anything was queued.
    fn refill(&self, state: &mut ExplorationState, metrics: &CoverageMetrics) -> bool {
        if let Some(current) = state.current_screen().cloned() {
            if self.enqueue_targets(state, &current) > 0 {
                return true;
            }
        }
        if !self.config.goal.backtracks() {
            return false;
        }

        let mut queued = 0;
        for item in &metrics.frontier {
            if Some(&item.screen_id) == state.current_screen()
                || self.candidate_targets(state, &item.screen_id).is_empty()
            {
                continue;
            }
            let priority = BACKTRACK_PRIORITY + item.unvisited.min(50) as i32;
            if state.enqueue(ExplorationTarget::navigate_to(item.screen_id.clone(), priority)) {
                queued += 1;
            }
        }
        if queued > 0 {
            info!(screens = queued, "backtracking to frontier screens");
        }
        queued > 0
    }
}

/// Priority from the element's own attributes.
pub fn rule_priority(element: &UiElement) -> i32 {
    let mut priority = BASE_PRIORITY;
    if element.text.as_deref().is_some_and(|t| !t.trim().is_empty()) {
        priority += TEXT_BONUS;
    }
    if element.resource_id.as_deref().is_some_and(|r| !r.is_empty()) {
        priority += RESOURCE_ID_BONUS;
    }
    if element.checkable {
        priority -= TOGGLE_PENALTY;
    }
    if let Some(label) = element.label() {
        let label = label.to_lowercase();
        if EXIT_WORDS.iter().any(|w| label.contains(w)) {
            priority -= EXIT_PENALTY;
        }
    }
    priority
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::{ExplorationGoal, ExplorationLimits};
    use crate::oracle::QValueScorer;
    use chrono::Duration;
    use screenwalk_ident::{Bounds, ScreenDescriptor};
    use std::sync::Arc;

    fn button(id: &str, text: Option<&str>) -> UiElement {
        UiElement::new(
            Some(&format!("com.test:id/{id}")),
            text,
            "android.widget.Button",
            Bounds::new(0, 0, 100, 50),
        )
        .clickable()
    }

    fn running() -> ExplorationState {
        let mut state = ExplorationState::new("com.test");
        state.start(Utc::now()).unwrap();
        state
    }

    fn capture(state: &mut ExplorationState, activity: &str, elements: Vec<UiElement>) -> ScreenId {
        state.record_screen(&ScreenDescriptor::new("com.test", activity, elements), Utc::now())
    }

    #[test]
    fn test_rule_priority() {
        assert_eq!(rule_priority(&button("open", Some("Open"))), 80);
        assert_eq!(rule_priority(&button("open", None)), 60);
        assert_eq!(rule_priority(&button("close", None)), 20);
        let toggle = UiElement::new(Some("com.test:id/wifi"), None, "android.widget.Switch", Bounds::default()).checkable(false);
        assert_eq!(rule_priority(&toggle), 30);
    }

    #[test]
    fn test_enqueue_filters_visited_and_dangerous() {
        let planner = Planner::new(ExplorationConfig::default());
        let mut state = running();
        let quit = button("quit", None);
        state.learn_dangerous_element(None, &quit);
        let home = capture(&mut state, ".Home", vec![button("a", None), button("b", None), quit.clone()]);
        let a_id = state.screen(&home).unwrap().elements[0].element_id.clone();
        state.mark_element_visited(&a_id);

        assert_eq!(planner.enqueue_targets(&mut state, &home), 1);
        // Re-enqueueing the same screen adds nothing.
        assert_eq!(planner.enqueue_targets(&mut state, &home), 0);
    }

    #[test]
    fn test_depth_limit_blocks_targets() {
        let config = ExplorationConfig {
            limits: Some(ExplorationLimits {
                max_depth: 1,
                ..ExplorationGoal::QuickScan.default_limits()
            }),
            ..Default::default()
        };
        let planner = Planner::new(config);
        let mut state = running();
        capture(&mut state, ".Home", vec![]);
        let deep = capture(&mut state, ".Deep", vec![button("x", None)]);
        assert_eq!(state.screen(&deep).unwrap().depth, 1);
        assert!(planner.candidate_targets(&state, &deep).is_empty());
    }

    #[test]
    fn test_executes_on_current_screen() {
        let planner = Planner::new(ExplorationConfig::default());
        let mut state = running();
        let home = capture(&mut state, ".Home", vec![button("go", Some("Go"))]);
        planner.enqueue_targets(&mut state, &home);
        match planner.next_action(&mut state, Utc::now()) {
            PlannerDecision::Execute(target) => assert_eq!(target.screen_id, home),
            other => panic!("expected Execute, got {other:?}"),
        }
    }

    #[test]
    fn test_navigates_to_other_screen() {
        let planner = Planner::new(ExplorationConfig::default());
        let mut state = running();
        let home = capture(&mut state, ".Home", vec![]);
        let list = capture(&mut state, ".List", vec![button("item", Some("Item"))]);
        state.record_transition(&home, "list_button", &list, None);
        planner.enqueue_targets(&mut state, &list);
        capture(&mut state, ".Home", vec![]);

        match planner.next_action(&mut state, Utc::now()) {
            PlannerDecision::Navigate { target, path } => {
                assert_eq!(target.screen_id, list);
                assert_eq!(path.len(), 1);
                assert_eq!(path[0].element_id, "list_button");
            }
            other => panic!("expected Navigate, got {other:?}"),
        }
    }

    #[test]
    fn test_unreachable_target_counts_failures() {
        let config = ExplorationConfig {
            max_screen_reach_failures: 0,
            ..Default::default()
        };
        let planner = Planner::new(config);
        let mut state = running();
        let island = capture(&mut state, ".Island", vec![button("x", Some("X"))]);
        planner.enqueue_targets(&mut state, &island);
        capture(&mut state, ".Home", vec![]);

        let decision = planner.next_action(&mut state, Utc::now());
        assert!(state.is_unreachable(&island));
        assert_eq!(decision, PlannerDecision::Stop(StopReason::ExplorationExhausted));
    }

    #[test]
    fn test_duration_limit_stops() {
        let planner = Planner::new(ExplorationConfig::default());
        let mut state = running();
        capture(&mut state, ".Home", vec![button("a", None)]);
        let later = Utc::now() + Duration::seconds(121);
        assert_eq!(
            planner.next_action(&mut state, later),
            PlannerDecision::Stop(StopReason::DurationExceeded)
        );
    }

    #[test]
    fn test_coverage_target_stops() {
        let planner = Planner::new(ExplorationConfig::for_goal(ExplorationGoal::CompleteCoverage));
        let mut state = running();
        let home = capture(&mut state, ".Home", vec![button("only", None)]);
        let id = state.screen(&home).unwrap().elements[0].element_id.clone();
        state.record_action_result(&home, &id, true, 3);
        assert_eq!(
            planner.next_action(&mut state, Utc::now()),
            PlannerDecision::Stop(StopReason::CoverageTargetReached)
        );
    }

    #[test]
    fn test_deep_map_does_not_stop_on_coverage() {
        let planner = Planner::new(ExplorationConfig::for_goal(ExplorationGoal::DeepMap));
        let mut state = running();
        let home = capture(&mut state, ".Home", vec![button("only", None)]);
        let id = state.screen(&home).unwrap().elements[0].element_id.clone();
        state.record_action_result(&home, &id, true, 3);
        assert!(planner.coverage(&state).is_complete(0.9));
        assert_eq!(
            planner.next_action(&mut state, Utc::now()),
            PlannerDecision::Stop(StopReason::ExplorationExhausted)
        );
    }

    #[test]
    fn test_target_coverage_skips_remaining_passes() {
        let config = ExplorationConfig {
            max_passes: 3,
            ..Default::default()
        };
        let planner = Planner::new(config);
        let mut state = running();
        let home = capture(&mut state, ".Home", vec![button("only", None)]);
        let id = state.screen(&home).unwrap().elements[0].element_id.clone();
        state.record_action_result(&home, &id, true, 3);
        assert_eq!(
            planner.next_action(&mut state, Utc::now()),
            PlannerDecision::Stop(StopReason::CoverageTargetReached)
        );
    }

    #[test]
    fn test_clickable_scroll_container_is_tapped_and_scrolled() {
        let planner = Planner::new(ExplorationConfig::default());
        let mut state = running();
        let list = UiElement::new(
            Some("com.test:id/list"),
            None,
            "android.widget.ListView",
            Bounds::new(0, 0, 100, 500),
        )
        .clickable()
        .scrollable();
        let home = capture(&mut state, ".Home", vec![list]);
        let id = state.screen(&home).unwrap().elements[0].element_id.clone();

        let kinds: Vec<TargetKind> = planner
            .candidate_targets(&state, &home)
            .into_iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(kinds, vec![TargetKind::ScrollContainer, TargetKind::TapElement]);
        planner.enqueue_targets(&mut state, &home);

        let PlannerDecision::Execute(first) = planner.next_action(&mut state, Utc::now()) else {
            panic!("expected Execute");
        };
        assert_eq!(first.kind, TargetKind::TapElement);
        state.record_action_result(&home, &id, true, 3);

        let PlannerDecision::Execute(second) = planner.next_action(&mut state, Utc::now()) else {
            panic!("expected Execute");
        };
        assert_eq!(second.kind, TargetKind::ScrollContainer);
        assert!(state.record_scroll_result(&home, &id, true, 1));

        assert_eq!(state.unvisited_work(&home), 0);
        assert!(state.graph().is_fully_explored(&home));
        assert_eq!(planner.coverage(&state).overall_coverage, 1.0);
    }

    #[test]
    fn test_depth_capped_screen_is_out_of_coverage() {
        let config = ExplorationConfig {
            limits: Some(ExplorationLimits {
                max_depth: 1,
                ..ExplorationGoal::QuickScan.default_limits()
            }),
            ..Default::default()
        };
        let planner = Planner::new(config);
        let mut state = running();
        let home = capture(&mut state, ".Home", vec![button("go", Some("Go"))]);
        let go = state.screen(&home).unwrap().elements[0].element_id.clone();
        state.record_action_result(&home, &go, true, 3);
        capture(&mut state, ".Deep", vec![button("x", None), button("y", None)]);

        let metrics = planner.coverage(&state);
        assert_eq!(metrics.screens_discovered, 1);
        assert_eq!(metrics.elements_discovered, 1);
        assert!(metrics.frontier.is_empty());
        assert!(metrics.is_complete(0.9));
    }

    #[test]
    fn test_foreign_package_screen_gets_no_targets() {
        let planner = Planner::new(ExplorationConfig::default());
        let mut state = running();
        capture(&mut state, ".Home", vec![]);
        let browser = state.record_screen(
            &ScreenDescriptor::new("org.mozilla.firefox", ".BrowserActivity", vec![button("url_bar", Some("Search"))]),
            Utc::now(),
        );
        assert!(planner.candidate_targets(&state, &browser).is_empty());
        assert_eq!(planner.enqueue_targets(&mut state, &browser), 0);
        assert_eq!(planner.coverage(&state).screens_discovered, 1);
    }

    #[test]
    fn test_multi_pass_requests_next_pass() {
        let config = ExplorationConfig {
            max_passes: 2,
            stop_at_target_coverage: false,
            ..Default::default()
        };
        let planner = Planner::new(config);
        let mut state = running();
        capture(&mut state, ".Home", vec![]);
        assert_eq!(planner.next_action(&mut state, Utc::now()), PlannerDecision::NextPass);
        state.start_next_pass();
        assert_eq!(
            planner.next_action(&mut state, Utc::now()),
            PlannerDecision::Stop(StopReason::PassLimitReached)
        );
    }

    #[test]
    fn test_paused_state() {
        let planner = Planner::new(ExplorationConfig::default());
        let mut state = running();
        state.pause().unwrap();
        assert_eq!(planner.next_action(&mut state, Utc::now()), PlannerDecision::Paused);
    }

    struct PreferLast;

    impl QValueScorer for PreferLast {
        fn score(&self, _: &ScreenId, elements: &[UiElement]) -> Vec<f64> {
            (0..elements.len())
                .map(|i| if i + 1 == elements.len() { 1.0 } else { 0.0 })
                .collect()
        }
    }

    #[test]
    fn test_scorer_reranks_targets() {
        let scorer = TimedScorer::new(Arc::new(PreferLast), std::time::Duration::from_secs(2));
        let planner = Planner::new(ExplorationConfig::default()).with_scorer(scorer);
        let mut state = running();
        let home = capture(&mut state, ".Home", vec![button("first", Some("First")), button("second", None)]);
        planner.enqueue_targets(&mut state, &home);
        let top = state.pop_target().unwrap();
        assert_eq!(top.priority, 60 + 50);
        assert!(top.element_id.unwrap().starts_with("second"));
    }
}
