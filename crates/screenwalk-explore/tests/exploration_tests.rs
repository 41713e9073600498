use chrono::Utc;
use screenwalk_explore::{
    CorrectionAction, ExplorationConfig, ExplorationGoal, ExplorationState, ExplorationStatus, IssueType,
    Planner, PlannerDecision, StopReason, TargetKind,
};
use screenwalk_ident::{Bounds, ScreenDescriptor, ScreenId, UiElement};

fn button(id: &str, text: Option<&str>) -> UiElement {
    UiElement::new(
        Some(&format!("com.example.notes:id/{id}")),
        text,
        "android.widget.Button",
        Bounds::new(0, 0, 200, 80),
    )
    .clickable()
}

fn capture(state: &mut ExplorationState, activity: &str, elements: Vec<UiElement>) -> ScreenId {
    state.record_screen(
        &ScreenDescriptor::new("com.example.notes", activity, elements),
        Utc::now(),
    )
}

fn element_id(state: &ExplorationState, screen: &ScreenId, index: usize) -> String {
    state.screen(screen).unwrap().elements[index].element_id.clone()
}

/// Home has one explored button leading to A; A still has two untouched
/// buttons; the driver is back on Home with an empty queue.
fn half_explored() -> (ExplorationState, ScreenId, ScreenId) {
    let mut state = ExplorationState::new("com.example.notes");
    state.start(Utc::now()).unwrap();
    let home = capture(&mut state, ".MainActivity", vec![button("open_a", Some("Open A"))]);
    let open_a = element_id(&state, &home, 0);
    state.record_action_result(&home, &open_a, true, 3);
    let a = capture(
        &mut state,
        ".AActivity",
        vec![button("x", Some("X")), button("y", Some("Y"))],
    );
    state.record_transition(&home, &open_a, &a, Some(".AActivity"));
    capture(&mut state, ".MainActivity", vec![button("open_a", Some("Open A"))]);
    (state, home, a)
}

#[test]
fn test_complete_coverage_backtracks_to_frontier() {
    let (mut state, home, a) = half_explored();
    let planner = Planner::new(ExplorationConfig::for_goal(ExplorationGoal::CompleteCoverage));

    match planner.next_action(&mut state, Utc::now()) {
        PlannerDecision::Navigate { target, path } => {
            assert_eq!(target.kind, TargetKind::NavigateToScreen);
            assert_eq!(target.screen_id, a);
            assert_eq!(path.len(), 1);
            assert_eq!(path[0].screen, home);
            assert_eq!(path[0].destination, a);
        }
        other => panic!("expected Navigate, got {other:?}"),
    }
}

#[test]
fn test_quick_scan_does_not_backtrack() {
    let (mut state, _, _) = half_explored();
    let planner = Planner::new(ExplorationConfig::default());
    assert_eq!(
        planner.next_action(&mut state, Utc::now()),
        PlannerDecision::Stop(StopReason::ExplorationExhausted)
    );
}

#[test]
fn test_arriving_at_navigate_target_expands_it() {
    let (mut state, home, a) = half_explored();
    let planner = Planner::new(ExplorationConfig::for_goal(ExplorationGoal::CompleteCoverage));
    let PlannerDecision::Navigate { target, path } = planner.next_action(&mut state, Utc::now()) else {
        panic!("expected Navigate");
    };

    // Driver walks the path.
    for step in &path {
        state.record_transition(&step.screen, &step.element_id, &step.destination, None);
    }
    capture(&mut state, ".AActivity", vec![button("x", Some("X")), button("y", Some("Y"))]);
    state.record_reach_success(&target.screen_id);
    state.enqueue(target);

    match planner.next_action(&mut state, Utc::now()) {
        PlannerDecision::Execute(next) => {
            assert_eq!(next.kind, TargetKind::TapElement);
            assert_eq!(next.screen_id, a);
        }
        other => panic!("expected Execute, got {other:?}"),
    }
    assert!(state.graph().element_navigation(&home, &path[0].element_id).unwrap().tap_count() >= 2);
}

#[test]
fn test_blocker_screen_is_not_explored() {
    let mut state = ExplorationState::new("com.example.notes");
    state.start(Utc::now()).unwrap();
    let home = capture(&mut state, ".MainActivity", vec![button("account", Some("Account"))]);
    let account = element_id(&state, &home, 0);
    let login = capture(&mut state, ".LoginActivity", vec![button("submit", Some("Submit"))]);
    state.record_transition(&home, &account, &login, Some("com.example.notes.LoginActivity"));

    let planner = Planner::new(ExplorationConfig::default());
    assert!(state.graph().is_blocker_screen(&login));
    assert!(planner.candidate_targets(&state, &login).is_empty());
    assert_eq!(state.issues().count_by_type()[&IssueType::BlockerEncountered], 1);

    // The blocker is left out of coverage: only Home counts.
    let metrics = planner.coverage(&state);
    assert_eq!(metrics.screens_discovered, 1);
}

#[test]
fn test_mark_dangerous_correction_filters_future_targets() {
    let mut state = ExplorationState::new("com.example.notes");
    state.start(Utc::now()).unwrap();
    let home = capture(
        &mut state,
        ".MainActivity",
        vec![button("wipe", Some("Wipe all")), button("keep", Some("Keep"))],
    );
    let wipe = element_id(&state, &home, 0);
    let issue = state.record_app_left("com.android.launcher3", Some(&wipe));
    state.apply_correction(issue, CorrectionAction::MarkDangerous).unwrap();

    // Same control on another screen is recognised by its resource segment.
    let other = capture(&mut state, ".ArchiveActivity", vec![button("wipe", None)]);
    let planner = Planner::new(ExplorationConfig::default());
    assert!(planner.candidate_targets(&state, &other).is_empty());
    assert!(state.is_element_visited(&wipe));
}

#[test]
fn test_candidates_accumulate_across_passes() {
    let mut state = ExplorationState::new("com.example.notes");
    state.start(Utc::now()).unwrap();
    let counter = UiElement::new(
        Some("com.example.notes:id/count"),
        Some("12 notes"),
        "android.widget.TextView",
        Bounds::new(0, 100, 300, 160),
    );
    capture(&mut state, ".MainActivity", vec![counter.clone(), button("new", Some("New note"))]);
    state.start_next_pass();
    let mut changed = counter.clone();
    changed.text = Some("13 notes".to_string());
    capture(&mut state, ".MainActivity", vec![changed, button("new", Some("New note"))]);

    assert_eq!(state.sensor_candidates().len(), 1);
    assert_eq!(state.sensor_candidates()[0].sample_text, "12 notes");
    assert_eq!(state.action_candidates().len(), 1);
    assert_eq!(state.pass_number(), 2);
}

#[test]
fn test_state_survives_json_mid_run() {
    let (mut state, _, a) = half_explored();
    state.pause().unwrap();
    let restored = ExplorationState::from_json(&state.to_json().unwrap()).unwrap();
    assert_eq!(restored.status(), ExplorationStatus::Paused);
    assert_eq!(restored.unvisited_work(&a), 2);
    assert_eq!(restored.visited_elements(), state.visited_elements());
}
