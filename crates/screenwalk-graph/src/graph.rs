use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use screenwalk_ident::ScreenId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::blocker::is_blocker_activity;
use crate::navigation::ElementNavigation;

/// Reliability assumed for a transition with no recorded history.
pub const UNKNOWN_RELIABILITY: f64 = 0.5;
pub const MIN_RELIABILITY: f64 = 0.1;
pub const MAX_RELIABILITY: f64 = 1.0;

const CONFIDENCE_PER_TAP: f64 = 0.02;
const MAX_CONFIDENCE_BOOST: f64 = 0.2;
const CONDITIONAL_PENALTY: f64 = 0.1;
const BLOCKER_PENALTY: f64 = 0.3;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transition {from} --{element_id}--> {to} references unknown screen {missing}")]
    UnknownScreen {
        from: ScreenId,
        element_id: String,
        to: ScreenId,
        missing: ScreenId,
    },

    #[error("navigation record keyed under {key} claims origin {recorded}")]
    MisfiledRecord { key: ScreenId, recorded: ScreenId },
}

/// What a single [`NavigationGraph::record_transition`] call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordedTransition {
    /// First time this element was seen landing on this destination.
    pub new_destination: bool,
    /// The element now has two or more destinations.
    pub conditional: bool,
    /// The destination was flagged as a blocker by this call.
    pub blocker: bool,
}

/// Aggregate counts for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub screens: usize,
    pub fully_explored: usize,
    /// Distinct (screen, element, destination) edges.
    pub transitions: usize,
    pub element_records: usize,
    pub conditional_elements: usize,
    pub blockers: usize,
    pub problematic: usize,
}

/// Screens discovered during exploration and the element taps that connect them.
///
/// Invariant: every screen that appears as the origin or destination of a
/// transition is in the known-screen set. Collections are only mutated through
/// methods that preserve this, and [`from_json`](Self::from_json) rejects input
/// that violates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationGraph {
    known_screens: BTreeSet<ScreenId>,
    fully_explored: BTreeSet<ScreenId>,
    blocker_screens: BTreeSet<ScreenId>,
    problematic: BTreeMap<ScreenId, String>,
    /// from screen -> element id -> observed destinations
    elements: BTreeMap<ScreenId, BTreeMap<String, ElementNavigation>>,
    /// from screen -> element id -> most recent destination (hop-count queries only)
    last_destination: BTreeMap<ScreenId, BTreeMap<String, ScreenId>>,
}

impl NavigationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a screen without any transition (e.g. the launch screen).
    pub fn add_screen(&mut self, screen: &ScreenId) -> bool {
        self.known_screens.insert(screen.clone())
    }

    /// Record that tapping `element_id` on `from` landed on `to`.
    ///
    /// If `to_activity` looks like an authentication or setup gate, `to` is
    /// flagged as a blocker both globally and for this element.
    pub fn record_transition(
        &mut self,
        from: &ScreenId,
        element_id: &str,
        to: &ScreenId,
        to_activity: Option<&str>,
    ) -> RecordedTransition {
        self.known_screens.insert(from.clone());
        self.known_screens.insert(to.clone());

        let nav = self
            .elements
            .entry(from.clone())
            .or_default()
            .entry(element_id.to_string())
            .or_insert_with(|| ElementNavigation::new(from.clone(), element_id, Utc::now()));
        let new_destination = nav.record(to);

        let blocker = to_activity.is_some_and(is_blocker_activity);
        if blocker {
            nav.flag_blocker(to);
        }
        let conditional = nav.is_conditional();

        self.last_destination
            .entry(from.clone())
            .or_default()
            .insert(element_id.to_string(), to.clone());

        if blocker && self.blocker_screens.insert(to.clone()) {
            info!(screen = %to, activity = to_activity.unwrap_or_default(), "blocker screen detected");
        }
        if new_destination && conditional {
            debug!(screen = %from, element = element_id, "element is conditional");
        }

        RecordedTransition {
            new_destination,
            conditional,
            blocker,
        }
    }

    // ── Blockers ─────────────────────────────────────────────────────

    pub fn mark_as_blocker(&mut self, screen: &ScreenId) {
        self.known_screens.insert(screen.clone());
        self.blocker_screens.insert(screen.clone());
    }

    pub fn is_blocker_screen(&self, screen: &ScreenId) -> bool {
        self.blocker_screens.contains(screen)
    }

    pub fn blocker_screens(&self) -> &BTreeSet<ScreenId> {
        &self.blocker_screens
    }

    // ── Element history ──────────────────────────────────────────────

    pub fn element_navigation(&self, from: &ScreenId, element_id: &str) -> Option<&ElementNavigation> {
        self.elements.get(from)?.get(element_id)
    }

    /// All element records from a screen, in element-id order.
    pub fn elements_from(&self, from: &ScreenId) -> impl Iterator<Item = &ElementNavigation> {
        self.elements.get(from).into_iter().flat_map(|m| m.values())
    }

    pub fn conditional_elements(&self) -> Vec<&ElementNavigation> {
        self.all_elements().filter(|nav| nav.is_conditional()).collect()
    }

    /// Where tapping the element most likely leads, ignoring blockers when a
    /// non-blocker destination has ever been observed.
    pub fn real_destination(&self, from: &ScreenId, element_id: &str) -> Option<ScreenId> {
        self.element_navigation(from, element_id)?
            .real_destination(|s| self.blocker_screens.contains(s))
            .cloned()
    }

    pub(crate) fn last_destinations(&self, from: &ScreenId) -> Option<&BTreeMap<String, ScreenId>> {
        self.last_destination.get(from)
    }

    fn all_elements(&self) -> impl Iterator<Item = &ElementNavigation> {
        self.elements.values().flat_map(|m| m.values())
    }

    // ── Completion and failure bookkeeping ───────────────────────────

    pub fn mark_fully_explored(&mut self, screen: &ScreenId) {
        self.known_screens.insert(screen.clone());
        self.fully_explored.insert(screen.clone());
    }

    pub fn is_fully_explored(&self, screen: &ScreenId) -> bool {
        self.fully_explored.contains(screen)
    }

    /// Problematic marks are sticky; the first recorded reason is kept.
    pub fn mark_screen_problematic(&mut self, screen: &ScreenId, reason: &str) {
        self.known_screens.insert(screen.clone());
        self.problematic
            .entry(screen.clone())
            .or_insert_with(|| reason.to_string());
    }

    pub fn is_problematic_screen(&self, screen: &ScreenId) -> bool {
        self.problematic.contains_key(screen)
    }

    pub fn problematic_reason(&self, screen: &ScreenId) -> Option<&str> {
        self.problematic.get(screen).map(String::as_str)
    }

    pub fn known_screens(&self) -> &BTreeSet<ScreenId> {
        &self.known_screens
    }

    pub fn is_known(&self, screen: &ScreenId) -> bool {
        self.known_screens.contains(screen)
    }

    pub fn unexplored_screens(&self) -> Vec<ScreenId> {
        self.known_screens
            .difference(&self.fully_explored)
            .cloned()
            .collect()
    }

    /// Forget fully-explored marks so another pass revisits every screen.
    /// Transitions, blockers and problematic marks survive.
    pub fn reset_exploration_marks(&mut self) {
        self.fully_explored.clear();
    }

    // ── Reliability ──────────────────────────────────────────────────

    /// Confidence in [0.1, 1.0] that tapping `element_id` on `from` reaches `to`.
    ///
    /// `visits_to / total_visits`, plus up to 0.2 for repeated confirmation
    /// (0.02 per tap), minus 0.1 for conditional elements and 0.3 when `to` has
    /// been a blocker destination of this element. Elements without history
    /// score 0.5.
    pub fn transition_reliability(&self, from: &ScreenId, element_id: &str, to: &ScreenId) -> f64 {
        let Some(nav) = self.element_navigation(from, element_id) else {
            return UNKNOWN_RELIABILITY;
        };
        let total = nav.total_visits();
        if total == 0 {
            return UNKNOWN_RELIABILITY;
        }

        let mut score = nav.visits_to(to) as f64 / total as f64;
        score += (nav.tap_count() as f64 * CONFIDENCE_PER_TAP).min(MAX_CONFIDENCE_BOOST);
        if nav.is_conditional() {
            score -= CONDITIONAL_PENALTY;
        }
        if nav.is_blocker_destination(to) {
            score -= BLOCKER_PENALTY;
        }
        score.clamp(MIN_RELIABILITY, MAX_RELIABILITY)
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            screens: self.known_screens.len(),
            fully_explored: self.fully_explored.len(),
            transitions: self.all_elements().map(|nav| nav.destinations().len()).sum(),
            element_records: self.all_elements().count(),
            conditional_elements: self.all_elements().filter(|nav| nav.is_conditional()).count(),
            blockers: self.blocker_screens.len(),
            problematic: self.problematic.len(),
        }
    }

    // ── Serialization ────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a graph and verify the known-screen invariant.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let graph: Self = serde_json::from_str(json)?;
        graph.validate()?;
        Ok(graph)
    }

    /// Check that every transition endpoint is a known screen and every
    /// record sits under its own origin.
    pub fn validate(&self) -> Result<(), GraphError> {
        for (key, by_element) in &self.elements {
            for (element_id, nav) in by_element {
                if nav.from_screen() != key {
                    return Err(GraphError::MisfiledRecord {
                        key: key.clone(),
                        recorded: nav.from_screen().clone(),
                    });
                }
                for to in nav.destinations().keys() {
                    for endpoint in [key, to] {
                        if !self.known_screens.contains(endpoint) {
                            return Err(GraphError::UnknownScreen {
                                from: key.clone(),
                                element_id: element_id.clone(),
                                to: to.clone(),
                                missing: endpoint.clone(),
                            });
                        }
                    }
                }
            }
        }
        for (from, by_element) in &self.last_destination {
            for (element_id, to) in by_element {
                for endpoint in [from, to] {
                    if !self.known_screens.contains(endpoint) {
                        return Err(GraphError::UnknownScreen {
                            from: from.clone(),
                            element_id: element_id.clone(),
                            to: to.clone(),
                            missing: endpoint.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
